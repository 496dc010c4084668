//! In-process metrics sink for the instrumentation layer.
//!
//! Counter/gauge/histogram families with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors so the order callers pass
//! them in never creates a second series. Accumulation is atomic; no lock is
//! held across an observation beyond the owning shard's entry lookup.

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use httpmeter_core::labels::names;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

pub struct CounterVec {
    name: &'static str,
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: &'static str) -> Self {
        Self { name, map: DashMap::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels)).or_insert_with(|| {
            tracing::trace!(metric = self.name, "new series");
            AtomicU64::new(0)
        });
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value; 0 for a series never touched.
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Drop every series. Test harnesses only.
    pub fn reset(&self) {
        self.map.clear();
    }
}

pub struct GaugeVec {
    name: &'static str,
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn new(name: &'static str) -> Self {
        Self { name, map: DashMap::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) { self.add(labels, 1); }
    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) { self.add(labels, -1); }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        self.add_key(label_key(labels), v);
    }

    fn add_key(&self, key: LabelKey, v: i64) {
        let gauge = self.map.entry(key).or_insert_with(|| {
            tracing::trace!(metric = self.name, "new series");
            AtomicI64::new(0)
        });
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |g| g.load(Ordering::Relaxed))
    }

    /// Increment now and return a token that decrements exactly once on drop.
    pub fn track(&self, labels: &[(&str, &str)]) -> InFlight<'_> {
        let key = label_key(labels);
        self.add_key(key.clone(), 1);
        InFlight { gauge: self, key }
    }

    /// Drop every series. Test harnesses only; a live `InFlight` token will
    /// decrement into a fresh series after this.
    pub fn reset(&self) {
        self.map.clear();
    }
}

/// One in-flight request or call, released when dropped.
pub struct InFlight<'a> {
    gauge: &'a GaugeVec,
    key: LabelKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gauge.add_key(std::mem::take(&mut self.key), -1);
    }
}

/// 100µs growing by 2.5x over 14 buckets (~15s at the top).
pub fn default_latency_buckets() -> Vec<f64> {
    (0..14).map(|i| 0.0001 * 2.5_f64.powi(i)).collect()
}

/// 64B to 16MiB in powers of four.
pub fn default_size_buckets() -> Vec<f64> {
    (0..10).map(|i| 64.0 * 4.0_f64.powi(i)).collect()
}

struct AtomicHistogram {
    count: AtomicU64,
    // f64 bits
    sum: AtomicU64,
    buckets: Box<[AtomicU64]>,
}

impl AtomicHistogram {
    fn new(len: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }
}

pub struct HistogramVec {
    name: &'static str,
    bounds: Vec<f64>,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// `bounds` are inclusive upper bounds, strictly increasing.
    pub fn new(name: &'static str, bounds: Vec<f64>) -> Self {
        Self { name, bounds, map: DashMap::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Observe a value and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], value: f64) {
        let hist = self.map.entry(label_key(labels)).or_insert_with(|| {
            tracing::trace!(metric = self.name, "new series");
            AtomicHistogram::new(self.bounds.len())
        });

        hist.count.fetch_add(1, Ordering::Relaxed);
        let _ = hist.sum.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + value).to_bits())
        });

        // Cumulative: every bucket whose bound is >= value.
        for (i, &le) in self.bounds.iter().enumerate() {
            if value <= le {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observe a duration in seconds.
    pub fn observe_duration(&self, labels: &[(&str, &str)], duration: Duration) {
        self.observe(labels, duration.as_secs_f64());
    }

    pub fn sample_count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map_or(0, |h| h.count.load(Ordering::Relaxed))
    }

    pub fn sample_sum(&self, labels: &[(&str, &str)]) -> f64 {
        self.map.get(&label_key(labels)).map_or(0.0, |h| h.sum())
    }

    /// Cumulative counts aligned with `bounds()`; empty for an unknown series.
    pub fn bucket_counts(&self, labels: &[(&str, &str)]) -> Vec<u64> {
        self.map
            .get(&label_key(labels))
            .map(|h| h.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect())
            .unwrap_or_default()
    }

    /// Drop every series. Test harnesses only.
    pub fn reset(&self) {
        self.map.clear();
    }
}

/// Every metric family emitted by the server and client middleware.
///
/// Constructed once per process and shared as `Arc<HttpMetrics>`.
pub struct HttpMetrics {
    pub server_latency: HistogramVec,
    pub server_request_size: HistogramVec,
    pub server_response_size: HistogramVec,
    pub server_time_to_write_header: HistogramVec,
    pub server_time_to_first_byte: HistogramVec,
    pub server_requests_total: CounterVec,
    pub server_active_requests: GaugeVec,
    pub client_latency: HistogramVec,
    pub client_requests_total: CounterVec,
    pub client_active_requests: GaugeVec,
    pub panic_recover_total: CounterVec,
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self::new(default_latency_buckets(), default_size_buckets())
    }
}

impl HttpMetrics {
    pub fn new(latency_buckets: Vec<f64>, size_buckets: Vec<f64>) -> Self {
        let latency = |name: &'static str| HistogramVec::new(name, latency_buckets.clone());
        let size = |name: &'static str| HistogramVec::new(name, size_buckets.clone());
        Self {
            server_latency: latency(names::SERVER_LATENCY),
            server_request_size: size(names::SERVER_REQUEST_SIZE),
            server_response_size: size(names::SERVER_RESPONSE_SIZE),
            server_time_to_write_header: latency(names::SERVER_TIME_TO_WRITE_HEADER),
            server_time_to_first_byte: latency(names::SERVER_TIME_TO_FIRST_BYTE),
            server_requests_total: CounterVec::new(names::SERVER_REQUESTS_TOTAL),
            server_active_requests: GaugeVec::new(names::SERVER_ACTIVE_REQUESTS),
            client_latency: latency(names::CLIENT_LATENCY),
            client_requests_total: CounterVec::new(names::CLIENT_REQUESTS_TOTAL),
            client_active_requests: GaugeVec::new(names::CLIENT_ACTIVE_REQUESTS),
            panic_recover_total: CounterVec::new(names::PANIC_RECOVER_TOTAL),
        }
    }

    /// Clear all families. Test harnesses only.
    pub fn reset(&self) {
        for h in [
            &self.server_latency,
            &self.server_request_size,
            &self.server_response_size,
            &self.server_time_to_write_header,
            &self.server_time_to_first_byte,
            &self.client_latency,
        ] {
            h.reset();
        }
        self.server_requests_total.reset();
        self.client_requests_total.reset();
        self.panic_recover_total.reset();
        self.server_active_requests.reset();
        self.client_active_requests.reset();
        tracing::debug!("metrics reset");
    }
}

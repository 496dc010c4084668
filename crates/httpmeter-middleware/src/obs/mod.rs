//! Lightweight in-process metrics sink.
//!
//! Families are stored as atomics keyed by label sets and shared through
//! `Arc<HttpMetrics>`. Exporting them is left to the embedding process.

pub mod metrics;

pub use metrics::{CounterVec, GaugeVec, HistogramVec, HttpMetrics, InFlight};

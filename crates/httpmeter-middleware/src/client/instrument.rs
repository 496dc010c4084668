//! Client instrumentation middleware.
//!
//! Purely observational: the wrapped transport's result is returned as is.
//! Per call it holds an active-request token `{method, slug, client_name}`
//! and emits latency and count once the call settles (or is dropped).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::{Request, Response, StatusCode};
use bytes::Bytes;

use httpmeter_core::labels::{
    is_success_status, method_label, ClientActiveLabels, ClientLabels, ClientTotalLabels,
    NO_STATUS_CODE,
};
use httpmeter_core::TransportError;

use crate::client::transport::Transport;
use crate::obs::{HttpMetrics, InFlight};

#[derive(Clone)]
pub struct ClientInstrumentation {
    metrics: Arc<HttpMetrics>,
}

impl ClientInstrumentation {
    pub fn new(metrics: Arc<HttpMetrics>) -> Self {
        Self { metrics }
    }

    /// Wrap `transport` for calls to the server identified by `slug`.
    pub fn instrument<T: Transport>(
        &self,
        slug: impl Into<Arc<str>>,
        client_name: impl Into<Arc<str>>,
        transport: T,
    ) -> InstrumentedTransport<T> {
        InstrumentedTransport {
            metrics: Arc::clone(&self.metrics),
            slug: slug.into(),
            client_name: client_name.into(),
            inner: transport,
        }
    }

    /// Same as [`Self::instrument`] with the slug doubling as client name.
    pub fn instrument_slug<T: Transport>(
        &self,
        slug: impl Into<Arc<str>>,
        transport: T,
    ) -> InstrumentedTransport<T> {
        let slug = slug.into();
        self.instrument(Arc::clone(&slug), slug, transport)
    }
}

pub struct InstrumentedTransport<T> {
    metrics: Arc<HttpMetrics>,
    slug: Arc<str>,
    client_name: Arc<str>,
    inner: T,
}

impl<T> InstrumentedTransport<T> {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for InstrumentedTransport<T> {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let method = method_label(request.method().as_str());
        let mut call = Call::begin(&self.metrics, method, &self.slug, &self.client_name);

        let result = self.inner.send(request).await;

        call.outcome = match &result {
            Ok(resp) => CallOutcome::Status(resp.status()),
            Err(e) => {
                tracing::warn!(slug = %self.slug, method, error = %e, "transport failed");
                CallOutcome::Failed
            }
        };
        result
    }
}

#[derive(Debug, Clone, Copy)]
enum CallOutcome {
    /// Dropped before the transport returned.
    Cancelled,
    Failed,
    Status(StatusCode),
}

struct Call<'a> {
    metrics: &'a HttpMetrics,
    method: &'static str,
    slug: &'a str,
    client_name: &'a str,
    start: Instant,
    outcome: CallOutcome,
    _active: InFlight<'a>,
}

impl<'a> Call<'a> {
    fn begin(
        metrics: &'a HttpMetrics,
        method: &'static str,
        slug: &'a str,
        client_name: &'a str,
    ) -> Self {
        let active = metrics
            .client_active_requests
            .track(&ClientActiveLabels { method, slug, client_name }.pairs());
        Self {
            metrics,
            method,
            slug,
            client_name,
            start: Instant::now(),
            outcome: CallOutcome::Cancelled,
            _active: active,
        }
    }
}

impl Drop for Call<'_> {
    fn drop(&mut self) {
        let latency = self.start.elapsed();
        let (success, code) = match self.outcome {
            CallOutcome::Status(s) => (is_success_status(s.as_u16()), s.as_str().to_string()),
            CallOutcome::Failed | CallOutcome::Cancelled => (false, NO_STATUS_CODE.to_string()),
        };

        self.metrics.client_latency.observe_duration(
            &ClientLabels {
                method: self.method,
                success,
                slug: self.slug,
                client_name: self.client_name,
            }
            .pairs(),
            latency,
        );
        self.metrics.client_requests_total.inc(
            &ClientTotalLabels {
                method: self.method,
                success,
                code: &code,
                slug: self.slug,
                client_name: self.client_name,
            }
            .pairs(),
        );

        tracing::debug!(
            slug = self.slug,
            client = self.client_name,
            method = self.method,
            code = %code,
            success,
            cancelled = matches!(self.outcome, CallOutcome::Cancelled),
            latency_us = latency.as_micros() as u64,
            "client call"
        );
    }
}

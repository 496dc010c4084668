//! Server instrumentation middleware.
//!
//! Wraps a [`Handler`] so each invocation:
//! 1. takes an active-request token `{method, endpoint}`;
//! 2. installs a [`MetricsResponseWriter`] over the real writer;
//! 3. runs the handler under the [`PanicGuard`];
//! 4. emits latency, size, count and timing metrics exactly once;
//! 5. releases the token.
//!
//! Emission and release live in `Drop for Exchange`, so they also fire when
//! the enclosing future is cancelled mid-handler.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::{header, HeaderValue, Method, StatusCode};

use httpmeter_core::labels::{
    is_success_status, method_label, ServerActiveLabels, ServerLabels, ServerTotalLabels,
    CANCELLED_STATUS,
};
use httpmeter_core::HandlerError;

use crate::obs::{HttpMetrics, InFlight};
use crate::server::handler::Handler;
use crate::server::recovery::PanicGuard;
use crate::transport::{
    write_error, InboundRequest, MetricsResponseWriter, RequestContext, ResponseWriter,
};

/// Builds instrumented handlers sharing one metrics sink.
#[derive(Clone)]
pub struct ServerInstrumentation {
    metrics: Arc<HttpMetrics>,
}

impl ServerInstrumentation {
    pub fn new(metrics: Arc<HttpMetrics>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &Arc<HttpMetrics> {
        &self.metrics
    }

    /// Wrap `handler` as the logical endpoint `endpoint` serving `methods`.
    ///
    /// Requests with any other method get `405` with an `Allow` header and are
    /// still counted.
    pub fn instrument<H: Handler>(
        &self,
        endpoint: impl Into<Arc<str>>,
        methods: impl IntoIterator<Item = Method>,
        handler: H,
    ) -> InstrumentedHandler<H> {
        let methods: Vec<Method> = methods.into_iter().collect();
        let allow = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        InstrumentedHandler {
            metrics: Arc::clone(&self.metrics),
            endpoint: endpoint.into(),
            allow: HeaderValue::from_str(&allow).ok(),
            methods,
            handler,
        }
    }
}

pub struct InstrumentedHandler<H> {
    metrics: Arc<HttpMetrics>,
    endpoint: Arc<str>,
    methods: Vec<Method>,
    allow: Option<HeaderValue>,
    handler: H,
}

impl<H> InstrumentedHandler<H> {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Record an exchange the hosting adapter refused before the handler
    /// could run (for example an oversized body). `err` is written as a JSON
    /// error response and counted like any other failed request.
    pub fn reject(
        &self,
        w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
        err: HandlerError,
    ) -> HandlerError {
        let method = method_label(req.method().as_str());
        let mut ex = Exchange::begin(&self.metrics, method, &self.endpoint, w, req);
        write_error(&mut ex.writer, &err);
        tracing::warn!(endpoint = %self.endpoint, method, error = %err, "request rejected");
        ex.finish(Some(&err));
        err
    }
}

#[async_trait]
impl<H: Handler> Handler for InstrumentedHandler<H> {
    async fn process(
        &self,
        ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        let method = method_label(req.method().as_str());
        let mut ex = Exchange::begin(&self.metrics, method, &self.endpoint, w, req);

        if !self.methods.contains(ex.request.method()) {
            if let Some(allow) = &self.allow {
                ex.writer.insert_header(header::ALLOW, allow.clone());
            }
            ex.writer.write_header(StatusCode::METHOD_NOT_ALLOWED);
            let err = HandlerError::MethodNotAllowed(ex.request.method().to_string());
            ex.finish(Some(&err));
            return Err(err);
        }

        let guard = PanicGuard::new(&self.metrics, method);
        let invocation = guard
            .catch(self.handler.process(ctx, &mut ex.writer, &mut *ex.request))
            .await;
        let result = invocation.complete(&mut ex.writer);

        if let Err(err) = &result {
            tracing::warn!(
                endpoint = %self.endpoint,
                method,
                error = %err,
                "handler returned error"
            );
        }
        ex.finish(result.as_ref().err());
        result
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    /// Handler has not returned: the exchange is being dropped early.
    Pending,
    Returned,
    /// Handler failed; the error's status applies if nothing was written.
    Failed(u16),
}

/// Per-request state from entry to emission.
struct Exchange<'a, W: ResponseWriter> {
    metrics: &'a HttpMetrics,
    method: &'static str,
    endpoint: &'a str,
    start: Instant,
    writer: MetricsResponseWriter<W>,
    request: &'a mut InboundRequest,
    outcome: Outcome,
    _active: InFlight<'a>,
}

impl<'a, W: ResponseWriter> Exchange<'a, W> {
    fn begin(
        metrics: &'a HttpMetrics,
        method: &'static str,
        endpoint: &'a str,
        writer: W,
        request: &'a mut InboundRequest,
    ) -> Self {
        let start = Instant::now();
        let active = metrics
            .server_active_requests
            .track(&ServerActiveLabels { method, endpoint }.pairs());
        Self {
            metrics,
            method,
            endpoint,
            start,
            writer: MetricsResponseWriter::new(writer),
            request,
            outcome: Outcome::Pending,
            _active: active,
        }
    }

    fn finish(&mut self, err: Option<&HandlerError>) {
        self.outcome = match err {
            None => Outcome::Returned,
            Some(e) => Outcome::Failed(e.status()),
        };
    }

    fn snapshot(&self) -> RequestMetricContext<'a> {
        let recorded = self.writer.status().map(|s| s.as_u16());
        let (status, success) = match self.outcome {
            Outcome::Pending => (recorded.unwrap_or(CANCELLED_STATUS), false),
            Outcome::Returned => {
                let s = self.writer.final_status().as_u16();
                (s, is_success_status(s))
            }
            Outcome::Failed(fallback) => (recorded.unwrap_or(fallback), false),
        };
        RequestMetricContext {
            method: self.method,
            endpoint: self.endpoint,
            start: self.start,
            status,
            request_bytes: self.request.body().consumed(),
            response_bytes: self.writer.byte_count(),
            header_at: self.writer.header_time(),
            first_byte_at: self.writer.first_byte_time(),
            success,
            cancelled: matches!(self.outcome, Outcome::Pending),
        }
    }
}

impl<W: ResponseWriter> Drop for Exchange<'_, W> {
    fn drop(&mut self) {
        self.snapshot().emit(self.metrics);
        // `_active` drops after this, releasing the token.
    }
}

/// Facts captured for one request, emitted once.
#[derive(Debug)]
struct RequestMetricContext<'a> {
    method: &'a str,
    endpoint: &'a str,
    start: Instant,
    status: u16,
    request_bytes: u64,
    response_bytes: u64,
    header_at: Option<Instant>,
    first_byte_at: Option<Instant>,
    success: bool,
    cancelled: bool,
}

impl RequestMetricContext<'_> {
    fn emit(&self, m: &HttpMetrics) {
        let labels = ServerLabels {
            method: self.method,
            success: self.success,
            endpoint: self.endpoint,
        }
        .pairs();
        let code = self.status.to_string();

        let latency = self.start.elapsed();
        m.server_latency.observe_duration(&labels, latency);
        m.server_request_size.observe(&labels, self.request_bytes as f64);
        m.server_response_size.observe(&labels, self.response_bytes as f64);
        m.server_requests_total.inc(
            &ServerTotalLabels {
                method: self.method,
                success: self.success,
                code: &code,
                endpoint: self.endpoint,
            }
            .pairs(),
        );
        if let Some(at) = self.header_at {
            m.server_time_to_write_header
                .observe_duration(&labels, at.saturating_duration_since(self.start));
        }
        if let Some(at) = self.first_byte_at {
            m.server_time_to_first_byte
                .observe_duration(&labels, at.saturating_duration_since(self.start));
        }

        tracing::debug!(
            endpoint = self.endpoint,
            method = self.method,
            code = self.status,
            success = self.success,
            cancelled = self.cancelled,
            latency_us = latency.as_micros() as u64,
            req_bytes = self.request_bytes,
            resp_bytes = self.response_bytes,
            "server exchange"
        );
    }
}

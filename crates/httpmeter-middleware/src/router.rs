//! Axum router wiring.
//!
//! Each endpoint is mounted as a route whose body is buffered, run through
//! its instrumented handler against a [`BufferedResponse`], and converted
//! back into an axum response. Handler errors that left nothing committed
//! are mapped to a JSON error body here, outside the instrumentation. A body
//! refused while buffering is still recorded through the endpoint's
//! instrumentation.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    response::Response,
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use httpmeter_core::error::{MeterError, Result};
use httpmeter_core::HandlerError;

use crate::app_state::AppState;
use crate::config::route_shape;
use crate::ops;
use crate::server::{Handler, InstrumentedHandler};
use crate::transport::{
    write_error, BufferedResponse, InboundRequest, RequestContext, ResponseWriter,
};

/// A routed, named endpoint.
#[derive(Clone)]
pub struct Endpoint {
    pub name: String,
    pub pattern: String,
    pub methods: Vec<Method>,
    pub handler: Arc<dyn Handler>,
}

/// Build the router from configured endpoints plus any extra ones.
///
/// Fails instead of panicking when two patterns would collide in axum.
pub fn build_router(state: AppState, extra: Vec<Endpoint>) -> Result<Router> {
    let mut endpoints = state.configured_endpoints()?;
    endpoints.extend(extra);

    let max_body = state.cfg().server.max_body_bytes;
    let instrumentation = state.server_instrumentation();

    let mut seen = HashSet::from([route_shape("/healthz")]);
    let mut router = Router::new().route("/healthz", get(ops::healthz));
    for ep in endpoints {
        if !ep.pattern.starts_with('/') {
            return Err(MeterError::InvalidConfig(format!(
                "pattern {} must start with '/'",
                ep.pattern
            )));
        }
        if !seen.insert(route_shape(&ep.pattern)) {
            return Err(MeterError::InvalidConfig(format!(
                "pattern {} is reserved or overlaps a mounted route",
                ep.pattern
            )));
        }
        let name: Arc<str> = Arc::from(ep.name.as_str());
        let handler =
            Arc::new(instrumentation.instrument(Arc::clone(&name), ep.methods, ep.handler));
        tracing::info!(endpoint = %name, pattern = %ep.pattern, "mounting endpoint");

        router = router.route(
            &ep.pattern,
            any(move |req: Request| {
                serve_endpoint(Arc::clone(&handler), Arc::clone(&name), max_body, req)
            }),
        );
    }
    Ok(router.with_state(state))
}

async fn serve_endpoint(
    handler: Arc<InstrumentedHandler<Arc<dyn Handler>>>,
    endpoint: Arc<str>,
    max_body: usize,
    req: Request,
) -> Response {
    let (parts, body) = req.into_parts();
    let ctx = RequestContext::new(endpoint);
    let mut out = BufferedResponse::new();

    let body = match read_body(body, max_body).await {
        Ok(b) => b,
        Err(err) => {
            let mut inbound = InboundRequest::new(parts, Bytes::new());
            handler.reject(&mut out, &mut inbound, err);
            return out.into_response();
        }
    };

    let mut inbound = InboundRequest::new(parts, body);
    if let Err(err) = handler.process(&ctx, &mut out, &mut inbound).await {
        if !out.is_committed() {
            write_error(&mut out, &err);
        }
    }
    out.into_response()
}

/// Buffer at most `limit` bytes. Only an oversized body maps to `413`; a
/// broken body stream is a `400`.
async fn read_body(body: Body, limit: usize) -> std::result::Result<Bytes, HandlerError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(HandlerError::Status {
            code: StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
            message: "request body too large".into(),
        }),
        Err(e) => Err(HandlerError::BadRequest(format!("read request body: {e}"))),
    }
}

//! Handlers and request builders shared by the middleware tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, Request, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use httpmeter_core::HandlerError;
use httpmeter_middleware::obs::HttpMetrics;
use httpmeter_middleware::server::Handler;
use httpmeter_middleware::transport::{
    write_json, BufferedResponse, InboundRequest, RequestContext, ResponseWriter,
};

/// Returns without writing anything.
pub struct Noop;

#[async_trait]
impl Handler for Noop {
    async fn process(
        &self,
        _ctx: &RequestContext,
        _w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExampleRequest {
    pub input: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExampleResponse {
    pub message: String,
}

/// Decodes `{"input": ..}` and answers 401 with a JSON body.
pub struct Unauthorized;

#[async_trait]
impl Handler for Unauthorized {
    async fn process(
        &self,
        _ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        let body: ExampleRequest = serde_json::from_reader(req.body_mut())
            .map_err(|e| HandlerError::BadRequest(e.to_string()))?;
        let resp = ExampleResponse { message: format!("Input: {:?}", body.input) };
        write_json(w, StatusCode::UNAUTHORIZED, &resp)
    }
}

/// Returns a plain error without writing.
pub struct Fails;

#[async_trait]
impl Handler for Fails {
    async fn process(
        &self,
        _ctx: &RequestContext,
        _w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::Internal("test".into()))
    }
}

pub struct Panics;

#[async_trait]
impl Handler for Panics {
    async fn process(
        &self,
        _ctx: &RequestContext,
        _w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        panic!("boom");
    }
}

/// Commits 201 and a partial body, then panics.
pub struct PanicsAfterWrite;

#[async_trait]
impl Handler for PanicsAfterWrite {
    async fn process(
        &self,
        _ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        w.write_header(StatusCode::CREATED);
        w.write(b"part").unwrap();
        panic!("late boom");
    }
}

/// Never returns.
pub struct Hangs;

#[async_trait]
impl Handler for Hangs {
    async fn process(
        &self,
        _ctx: &RequestContext,
        _w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Explicit header, then two chunks.
pub struct Streams;

#[async_trait]
impl Handler for Streams {
    async fn process(
        &self,
        _ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        w.write_header(StatusCode::OK);
        tokio::task::yield_now().await;
        w.write(b"hello").unwrap();
        w.write(b"world").unwrap();
        Ok(())
    }
}

/// Yields, then answers with a fixed status and short body.
pub struct Replies(pub StatusCode);

#[async_trait]
impl Handler for Replies {
    async fn process(
        &self,
        _ctx: &RequestContext,
        w: &mut dyn ResponseWriter,
        _req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        tokio::task::yield_now().await;
        w.write_header(self.0);
        w.write(b"ok").unwrap();
        Ok(())
    }
}

/// Records the server active gauge as seen from inside the handler.
pub struct Probe {
    pub metrics: Arc<HttpMetrics>,
    pub seen: std::sync::Mutex<Option<i64>>,
}

#[async_trait]
impl Handler for Probe {
    async fn process(
        &self,
        ctx: &RequestContext,
        _w: &mut dyn ResponseWriter,
        req: &mut InboundRequest,
    ) -> Result<(), HandlerError> {
        let v = self.metrics.server_active_requests.get(&[
            ("http_method", req.method().as_str()),
            ("http_endpoint", ctx.endpoint()),
        ]);
        *self.seen.lock().unwrap() = Some(v);
        Ok(())
    }
}

pub fn request(method: Method, uri: &str, body: &[u8]) -> InboundRequest {
    InboundRequest::from_http(
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::copy_from_slice(body))
            .unwrap(),
    )
}

/// `{"input":"foo"}` plus a trailing newline: 16 bytes.
pub fn example_body() -> Vec<u8> {
    let mut b = serde_json::to_vec(&ExampleRequest { input: "foo".into() }).unwrap();
    b.push(b'\n');
    b
}

/// Run `h` against a fresh buffered writer.
pub async fn call<H: Handler>(
    h: &H,
    endpoint: &str,
    mut req: InboundRequest,
) -> (BufferedResponse, Result<(), HandlerError>) {
    let ctx = RequestContext::new(endpoint);
    let mut out = BufferedResponse::new();
    let res = h.process(&ctx, &mut out, &mut req).await;
    (out, res)
}

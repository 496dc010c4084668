//! Response writing: the handler-facing capability, the observing wrapper
//! installed by the server middleware, and a buffered concrete writer.
//!
//! Protocol rules shared by every writer:
//! - the first `write_header` wins, later calls do not change the status;
//! - the first `write` without a prior `write_header` commits `200 OK`;
//! - headers inserted after the status is committed are ignored.

use std::io;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::BytesMut;
use serde::Serialize;

use httpmeter_core::HandlerError;

/// Outbound response channel for one request.
pub trait ResponseWriter: Send {
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue);
    fn write_header(&mut self, status: StatusCode);
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
    /// Whether a status has been committed.
    fn is_committed(&self) -> bool;
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        (**self).insert_header(name, value)
    }

    fn write_header(&mut self, status: StatusCode) {
        (**self).write_header(status)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn is_committed(&self) -> bool {
        (**self).is_committed()
    }
}

/// Decorates a writer with status, size and timing capture.
///
/// Everything is forwarded untouched; the wrapper only observes.
pub struct MetricsResponseWriter<W> {
    inner: W,
    status: Option<StatusCode>,
    bytes: u64,
    header_at: Option<Instant>,
    first_byte_at: Option<Instant>,
}

impl<W: ResponseWriter> MetricsResponseWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            status: None,
            bytes: 0,
            header_at: None,
            first_byte_at: None,
        }
    }

    /// Status recorded by the first header write, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Recorded status, or `200` when nothing was written.
    pub fn final_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn byte_count(&self) -> u64 {
        self.bytes
    }

    pub fn header_time(&self) -> Option<Instant> {
        self.header_at
    }

    pub fn first_byte_time(&self) -> Option<Instant> {
        self.first_byte_at
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ResponseWriter> ResponseWriter for MetricsResponseWriter<W> {
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.insert_header(name, value);
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
            self.header_at = Some(Instant::now());
        }
        self.inner.write_header(status);
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        if self.first_byte_at.is_none() && !data.is_empty() {
            self.first_byte_at = Some(Instant::now());
        }
        let n = self.inner.write(data)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn is_committed(&self) -> bool {
        self.status.is_some() || self.inner.is_committed()
    }
}

/// Collects a whole response in memory, then hands it to axum.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut res = Response::new(Body::from(self.body.freeze()));
        *res.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseWriter for BufferedResponse {
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.status.is_none() {
            self.headers.insert(name, value);
        }
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn is_committed(&self) -> bool {
        self.status.is_some()
    }
}

/// Write `body` as a JSON document followed by a newline.
pub fn write_json<T: Serialize + ?Sized>(
    w: &mut dyn ResponseWriter,
    status: StatusCode,
    body: &T,
) -> Result<(), HandlerError> {
    let mut buf = serde_json::to_vec(body)
        .map_err(|e| HandlerError::Internal(format!("encode json: {e}")))?;
    buf.push(b'\n');

    w.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write_header(status);
    w.write(&buf)
        .map_err(|e| HandlerError::Internal(format!("write body: {e}")))?;
    Ok(())
}

/// Write `err` as a `{"code", "msg"}` JSON body under the error's status.
pub fn write_error(w: &mut dyn ResponseWriter, err: &HandlerError) {
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({ "code": err.client_code(), "msg": err.to_string() });
    if let Err(e) = write_json(w, status, &body) {
        tracing::warn!(error = %e, "failed to write error body");
    }
}

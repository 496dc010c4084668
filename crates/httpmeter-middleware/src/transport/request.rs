//! Inbound request handed to handlers.
//!
//! The body is fully buffered by the hosting adapter, but handlers consume it
//! through a counting reader so the request-size metric reflects the bytes
//! actually read (an untouched body counts as 0).

use std::io;
use std::sync::Arc;

use axum::http::{request::Parts, HeaderMap, Method, Uri};
use bytes::Bytes;

/// Per-request context passed alongside the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    endpoint: Arc<str>,
}

impl RequestContext {
    pub fn new(endpoint: impl Into<Arc<str>>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    /// Logical endpoint name resolved by routing.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug)]
pub struct InboundRequest {
    parts: Parts,
    body: RequestBody,
}

impl InboundRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self { parts, body: RequestBody::new(body) }
    }

    /// Build a request without going through axum. Mostly for tests.
    pub fn from_http(req: axum::http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }
}

/// Buffered request body that tracks how much of it has been read.
#[derive(Debug)]
pub struct RequestBody {
    data: Bytes,
    pos: usize,
}

impl RequestBody {
    fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.pos as u64
    }

    /// Total buffered length, read or not.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume everything that is left.
    pub fn read_all(&mut self) -> Bytes {
        let rest = self.data.slice(self.pos..);
        self.pos = self.data.len();
        rest
    }
}

impl io::Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.data[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

//! Request/response plumbing shared by handlers and the server middleware.

pub mod request;
pub mod writer;

pub use request::{InboundRequest, RequestBody, RequestContext};
pub use writer::{
    write_error, write_json, BufferedResponse, MetricsResponseWriter, ResponseWriter,
};

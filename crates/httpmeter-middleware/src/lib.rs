//! httpmeter middleware library.
//!
//! Request-lifecycle instrumentation for HTTP servers and clients: the
//! observing response writer, the server middleware with its panic recovery
//! guard, the client transport middleware, and the in-process metrics sink
//! they report into. The axum router and app state host instrumented
//! endpoints for the demo binary and integration tests.

pub mod app_state;
pub mod client;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod server;
pub mod services;
pub mod transport;

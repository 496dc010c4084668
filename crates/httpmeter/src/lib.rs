//! Top-level facade crate for httpmeter.
//!
//! Re-exports the label schema, error types and the instrumentation layer so
//! services can depend on a single crate.

pub mod core {
    pub use httpmeter_core::*;
}

pub mod middleware {
    pub use httpmeter_middleware::*;
}

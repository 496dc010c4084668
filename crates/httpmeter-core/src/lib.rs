//! httpmeter core: the metric label schema and error taxonomy shared by the
//! server and client instrumentation layers.
//!
//! This crate carries no HTTP, runtime or async dependencies. Status codes
//! and methods cross its boundary as plain `u16`/`&str` so it can be reused
//! by any transport adapter.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod labels;

pub use error::{HandlerError, MeterError, Result, TransportError};

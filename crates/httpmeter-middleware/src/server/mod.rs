//! Server side: the handler capability, its instrumentation, and panic
//! recovery.

pub mod handler;
pub mod instrument;
pub mod recovery;

pub use handler::Handler;
pub use instrument::{InstrumentedHandler, ServerInstrumentation};
pub use recovery::{Invocation, PanicGuard};

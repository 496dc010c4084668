//! Client side: the outbound transport capability and its instrumentation.

pub mod instrument;
pub mod transport;

pub use instrument::{ClientInstrumentation, InstrumentedTransport};
pub use transport::{HttpTransport, Transport};

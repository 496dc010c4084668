//! Error taxonomy for instrumented exchanges and process setup.

use serde::Serialize;
use thiserror::Error;

/// Stable codes carried in error response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCode {
    /// Handler chose an explicit status.
    Status,
    /// Invalid input / malformed body.
    BadRequest,
    /// Method not served by the endpoint.
    MethodNotAllowed,
    /// Internal server error, including recovered panics.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::Status => "STATUS",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Error returned by endpoint handlers.
///
/// The instrumentation layer observes these and passes them on unchanged;
/// turning them into a response is left to the hosting adapter.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{message}")]
    Status { code: u16, message: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    /// Produced only by the panic recovery guard.
    #[error("recovered from panic: {0}")]
    Recovered(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Status an error mapper should answer with when nothing was written yet.
    pub fn status(&self) -> u16 {
        match self {
            HandlerError::Status { code, .. } => *code,
            HandlerError::BadRequest(_) => 400,
            HandlerError::MethodNotAllowed(_) => 405,
            HandlerError::Recovered(_) | HandlerError::Internal(_) => 500,
        }
    }

    pub fn client_code(&self) -> ClientCode {
        match self {
            HandlerError::Status { .. } => ClientCode::Status,
            HandlerError::BadRequest(_) => ClientCode::BadRequest,
            HandlerError::MethodNotAllowed(_) => ClientCode::MethodNotAllowed,
            HandlerError::Recovered(_) | HandlerError::Internal(_) => ClientCode::Internal,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, HandlerError::Recovered(_))
    }
}

/// Outbound send failure: no response was received, so there is no status.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Shared result type for configuration and startup.
pub type Result<T> = std::result::Result<T, MeterError>;

/// Configuration / startup errors.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("io: {0}")]
    Io(String),
}

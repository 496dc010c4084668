//! Panic recovery around a single handler invocation.
//!
//! `Running` is the `catch` future; it settles into an [`Invocation`]
//! (`Returned` or `Panicked`, the recovered state), and `complete` moves it to
//! the terminal result. A panic never escapes: it is counted, the response is
//! left with a defined status and the caller receives
//! [`HandlerError::Recovered`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use axum::http::StatusCode;
use futures_util::FutureExt;

use httpmeter_core::labels::PanicLabels;
use httpmeter_core::HandlerError;

use crate::obs::HttpMetrics;
use crate::transport::ResponseWriter;

pub struct PanicGuard<'a> {
    metrics: &'a HttpMetrics,
    method: &'a str,
}

/// Settled handler invocation.
#[derive(Debug)]
pub enum Invocation {
    Returned(Result<(), HandlerError>),
    Panicked(String),
}

impl<'a> PanicGuard<'a> {
    pub fn new(metrics: &'a HttpMetrics, method: &'a str) -> Self {
        Self { metrics, method }
    }

    /// Drive `fut` to completion, catching any unwind.
    pub async fn catch<F>(&self, fut: F) -> Invocation
    where
        F: Future<Output = Result<(), HandlerError>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => Invocation::Returned(result),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                self.metrics
                    .panic_recover_total
                    .inc(&PanicLabels { method: self.method }.pairs());
                tracing::error!(method = self.method, panic = %msg, "recovered panic in handler");
                Invocation::Panicked(msg)
            }
        }
    }
}

impl Invocation {
    /// Final result for the caller. After a panic, writes `500` if no status
    /// was committed; a committed status cannot be changed and is left as is.
    pub fn complete(self, w: &mut dyn ResponseWriter) -> Result<(), HandlerError> {
        match self {
            Invocation::Returned(result) => result,
            Invocation::Panicked(msg) => {
                if !w.is_committed() {
                    w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                }
                Err(HandlerError::Recovered(msg))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

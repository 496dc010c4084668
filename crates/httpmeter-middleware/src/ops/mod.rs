//! Operational HTTP endpoints, mounted outside the instrumentation.
//!
//! - `/healthz` : liveness

use axum::{http::StatusCode, response::IntoResponse};

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

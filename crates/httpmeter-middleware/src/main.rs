//! httpmeter demo server.
//!
//! Serves the endpoints declared in `httpmeter.yaml` through the server
//! instrumentation and logs every exchange at debug level
//! (`RUST_LOG=httpmeter_middleware=debug`).

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use httpmeter_middleware::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "httpmeter-demo failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "httpmeter.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg.server.listen.parse()?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state, Vec::new())?;

    tracing::info!(%listen, "httpmeter-demo starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

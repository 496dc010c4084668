//! Shared application state.
//!
//! Owns the config, the process-wide metrics sink and the service registry.
//! The sink is created once here and injected into both instrumentation
//! builders.

use std::sync::Arc;

use httpmeter_core::error::{MeterError, Result};

use crate::client::{ClientInstrumentation, HttpTransport, InstrumentedTransport};
use crate::config::MeterConfig;
use crate::obs::HttpMetrics;
use crate::router::Endpoint;
use crate::server::ServerInstrumentation;
use crate::services::ServiceRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: MeterConfig,
    metrics: Arc<HttpMetrics>,
    services: ServiceRegistry,
}

impl AppState {
    /// Build state with the built-in services.
    pub fn new(cfg: MeterConfig) -> Result<Self> {
        Self::with_services(cfg, ServiceRegistry::with_builtins())
    }

    /// Build state, checking that every configured endpoint names a
    /// registered service.
    pub fn with_services(cfg: MeterConfig, services: ServiceRegistry) -> Result<Self> {
        for ep in &cfg.server.endpoints {
            if services.get(&ep.service).is_none() {
                return Err(MeterError::InvalidConfig(format!(
                    "endpoint {} refers to unknown service {} (known: {:?})",
                    ep.name,
                    ep.service,
                    services.kinds()
                )));
            }
        }

        let metrics = Arc::new(HttpMetrics::new(
            cfg.metrics.latency_buckets.clone(),
            cfg.metrics.size_buckets.clone(),
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, metrics, services }),
        })
    }

    pub fn cfg(&self) -> &MeterConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<HttpMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn server_instrumentation(&self) -> ServerInstrumentation {
        ServerInstrumentation::new(self.metrics())
    }

    pub fn client_instrumentation(&self) -> ClientInstrumentation {
        ClientInstrumentation::new(self.metrics())
    }

    /// Instrumented `reqwest` client for calls to `slug`, using the
    /// configured timeout.
    pub fn http_client(
        &self,
        slug: &str,
        client_name: &str,
    ) -> Result<InstrumentedTransport<HttpTransport>> {
        let transport = HttpTransport::new(self.inner.cfg.client.timeout())
            .map_err(|e| MeterError::InvalidConfig(e.to_string()))?;
        Ok(self.client_instrumentation().instrument(slug, client_name, transport))
    }

    /// Endpoints declared in config, resolved against the registry.
    pub fn configured_endpoints(&self) -> Result<Vec<Endpoint>> {
        self.inner
            .cfg
            .server
            .endpoints
            .iter()
            .map(|ep| {
                let handler = self.inner.services.get(&ep.service).ok_or_else(|| {
                    MeterError::InvalidConfig(format!("unknown service {}", ep.service))
                })?;
                Ok(Endpoint {
                    name: ep.name.clone(),
                    pattern: ep.pattern.clone(),
                    methods: ep.parsed_methods()?,
                    handler,
                })
            })
            .collect()
    }
}

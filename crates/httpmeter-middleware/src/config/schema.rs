use std::collections::HashSet;
use std::time::Duration;

use axum::http::Method;
use httpmeter_core::error::{MeterError, Result};
use serde::Deserialize;

use crate::obs::metrics::{default_latency_buckets, default_size_buckets};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeterConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl MeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MeterError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.client.validate()?;
        self.metrics.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_bytes: default_max_body_bytes(),
            endpoints: Vec::new(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=64 * 1024 * 1024).contains(&self.max_body_bytes) {
            return Err(MeterError::InvalidConfig(
                "server.max_body_bytes must be between 1 and 67108864".into(),
            ));
        }

        let mut names = HashSet::new();
        let mut patterns = HashSet::new();
        for ep in &self.endpoints {
            ep.validate()?;
            if !names.insert(ep.name.as_str()) {
                return Err(MeterError::InvalidConfig(format!(
                    "duplicate endpoint name: {}",
                    ep.name
                )));
            }
            if !patterns.insert(route_shape(&ep.pattern)) {
                return Err(MeterError::InvalidConfig(format!(
                    "endpoint pattern {} overlaps an earlier one",
                    ep.pattern
                )));
            }
        }
        Ok(())
    }
}

/// Pattern with capture names erased, so `/u/:id` and `/u/:name` collide.
///
/// Two patterns with the same shape cannot be mounted on one router.
pub fn route_shape(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|seg| {
            if seg.starts_with(':') || seg.starts_with('*') {
                "{}"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// One routed endpoint. `name` is the `http_endpoint` label value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub name: String,
    pub pattern: String,
    pub methods: Vec<String>,
    pub service: String,
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<()> {
        let name_ok = !self.name.is_empty()
            && self
                .name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if !name_ok {
            return Err(MeterError::InvalidConfig(format!(
                "endpoint name must match [a-z0-9_]+: {:?}",
                self.name
            )));
        }
        if !self.pattern.starts_with('/') {
            return Err(MeterError::InvalidConfig(format!(
                "endpoint {} pattern must start with '/'",
                self.name
            )));
        }
        if self.methods.is_empty() {
            return Err(MeterError::InvalidConfig(format!(
                "endpoint {} must list at least one method",
                self.name
            )));
        }
        self.parsed_methods().map(|_| ())
    }

    /// Methods as typed values; only the standard verbs are accepted.
    pub fn parsed_methods(&self) -> Result<Vec<Method>> {
        self.methods
            .iter()
            .map(|m| match m.as_str() {
                "GET" => Ok(Method::GET),
                "HEAD" => Ok(Method::HEAD),
                "POST" => Ok(Method::POST),
                "PUT" => Ok(Method::PUT),
                "DELETE" => Ok(Method::DELETE),
                "OPTIONS" => Ok(Method::OPTIONS),
                "PATCH" => Ok(Method::PATCH),
                other => Err(MeterError::InvalidConfig(format!(
                    "endpoint {} has unsupported method {other}",
                    self.name
                ))),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    #[serde(default = "default_client_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self { timeout_ms: default_client_timeout_ms() }
    }
}

impl ClientSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=300_000).contains(&self.timeout_ms) {
            return Err(MeterError::InvalidConfig(
                "client.timeout_ms must be between 1 and 300000".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,

    #[serde(default = "default_size_buckets")]
    pub size_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            latency_buckets: default_latency_buckets(),
            size_buckets: default_size_buckets(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        check_buckets("metrics.latency_buckets", &self.latency_buckets)?;
        check_buckets("metrics.size_buckets", &self.size_buckets)
    }
}

fn check_buckets(field: &str, bounds: &[f64]) -> Result<()> {
    if bounds.is_empty() {
        return Err(MeterError::InvalidConfig(format!("{field} must not be empty")));
    }
    if bounds.iter().any(|b| !b.is_finite() || *b <= 0.0) {
        return Err(MeterError::InvalidConfig(format!(
            "{field} must hold positive finite values"
        )));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MeterError::InvalidConfig(format!(
            "{field} must be strictly increasing"
        )));
    }
    Ok(())
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}
fn default_client_timeout_ms() -> u64 {
    10_000
}

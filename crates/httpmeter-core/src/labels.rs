//! Metric label schema.
//!
//! Every metric family has a fixed label set. Values are bounded: methods
//! are folded into the standard verb vocabulary, endpoints are logical route
//! names (never raw paths) and codes are the statuses actually observed.

pub const METHOD_LABEL: &str = "http_method";
pub const SUCCESS_LABEL: &str = "http_success";
pub const CODE_LABEL: &str = "http_response_code";
pub const ENDPOINT_LABEL: &str = "http_endpoint";
pub const SLUG_LABEL: &str = "http_slug";
pub const CLIENT_NAME_LABEL: &str = "http_client_name";

/// Metric family names.
pub mod names {
    pub const SERVER_LATENCY: &str = "http_server_latency_seconds";
    pub const SERVER_REQUEST_SIZE: &str = "http_server_request_size_bytes";
    pub const SERVER_RESPONSE_SIZE: &str = "http_server_response_size_bytes";
    pub const SERVER_TIME_TO_WRITE_HEADER: &str = "http_server_time_to_write_header_seconds";
    pub const SERVER_TIME_TO_FIRST_BYTE: &str = "http_server_time_to_first_byte_seconds";
    pub const SERVER_REQUESTS_TOTAL: &str = "http_server_requests_total";
    pub const SERVER_ACTIVE_REQUESTS: &str = "http_server_active_requests";
    pub const CLIENT_LATENCY: &str = "http_client_latency_seconds";
    pub const CLIENT_REQUESTS_TOTAL: &str = "http_client_requests_total";
    pub const CLIENT_ACTIVE_REQUESTS: &str = "http_client_active_requests";
    pub const PANIC_RECOVER_TOTAL: &str = "httpmeter_server_panic_recover_total";
}

/// `code` value for a client call that failed before any status arrived.
pub const NO_STATUS_CODE: &str = "";

/// Status recorded for a server request cancelled before anything was written.
pub const CANCELLED_STATUS: u16 = 499;

const METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// Fold a request method into the finite label vocabulary.
pub fn method_label(method: &str) -> &'static str {
    METHODS
        .iter()
        .find(|m| **m == method)
        .copied()
        .unwrap_or("OTHER")
}

pub fn success_label(success: bool) -> &'static str {
    if success {
        "true"
    } else {
        "false"
    }
}

/// 1xx-3xx count as success, 4xx and 5xx as failure.
pub fn is_success_status(code: u16) -> bool {
    (100..400).contains(&code)
}

/// `{method, success, endpoint}`: server latency, size and timing histograms.
#[derive(Debug, Clone, Copy)]
pub struct ServerLabels<'a> {
    pub method: &'a str,
    pub success: bool,
    pub endpoint: &'a str,
}

impl<'a> ServerLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 3] {
        [
            (METHOD_LABEL, self.method),
            (SUCCESS_LABEL, success_label(self.success)),
            (ENDPOINT_LABEL, self.endpoint),
        ]
    }
}

/// `{method, success, code, endpoint}`: server request counter.
#[derive(Debug, Clone, Copy)]
pub struct ServerTotalLabels<'a> {
    pub method: &'a str,
    pub success: bool,
    pub code: &'a str,
    pub endpoint: &'a str,
}

impl<'a> ServerTotalLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 4] {
        [
            (METHOD_LABEL, self.method),
            (SUCCESS_LABEL, success_label(self.success)),
            (CODE_LABEL, self.code),
            (ENDPOINT_LABEL, self.endpoint),
        ]
    }
}

/// `{method, endpoint}`: server in-flight gauge.
#[derive(Debug, Clone, Copy)]
pub struct ServerActiveLabels<'a> {
    pub method: &'a str,
    pub endpoint: &'a str,
}

impl<'a> ServerActiveLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 2] {
        [(METHOD_LABEL, self.method), (ENDPOINT_LABEL, self.endpoint)]
    }
}

/// `{method, success, slug, client_name}`: client latency histogram.
#[derive(Debug, Clone, Copy)]
pub struct ClientLabels<'a> {
    pub method: &'a str,
    pub success: bool,
    pub slug: &'a str,
    pub client_name: &'a str,
}

impl<'a> ClientLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 4] {
        [
            (METHOD_LABEL, self.method),
            (SUCCESS_LABEL, success_label(self.success)),
            (SLUG_LABEL, self.slug),
            (CLIENT_NAME_LABEL, self.client_name),
        ]
    }
}

/// `{method, success, code, slug, client_name}`: client request counter.
#[derive(Debug, Clone, Copy)]
pub struct ClientTotalLabels<'a> {
    pub method: &'a str,
    pub success: bool,
    pub code: &'a str,
    pub slug: &'a str,
    pub client_name: &'a str,
}

impl<'a> ClientTotalLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 5] {
        [
            (METHOD_LABEL, self.method),
            (SUCCESS_LABEL, success_label(self.success)),
            (CODE_LABEL, self.code),
            (SLUG_LABEL, self.slug),
            (CLIENT_NAME_LABEL, self.client_name),
        ]
    }
}

/// `{method, slug, client_name}`: client in-flight gauge.
#[derive(Debug, Clone, Copy)]
pub struct ClientActiveLabels<'a> {
    pub method: &'a str,
    pub slug: &'a str,
    pub client_name: &'a str,
}

impl<'a> ClientActiveLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 3] {
        [
            (METHOD_LABEL, self.method),
            (SLUG_LABEL, self.slug),
            (CLIENT_NAME_LABEL, self.client_name),
        ]
    }
}

/// `{method}`: recovered panic counter.
#[derive(Debug, Clone, Copy)]
pub struct PanicLabels<'a> {
    pub method: &'a str,
}

impl<'a> PanicLabels<'a> {
    pub fn pairs(&self) -> [(&'static str, &'a str); 1] {
        [(METHOD_LABEL, self.method)]
    }
}

//! Configuration sections.

use mosaic_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[server]`: listener, endpoint and timeouts.
///
/// ```
/// use mosaic_config::ServerSection;
///
/// let server = ServerSection::default();
/// assert_eq!(server.http_addr, "0.0.0.0:8080");
/// assert_eq!(server.endpoint_path, "/graphql");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// HTTP bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Path the gateway endpoint is served on.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Bound on body collection, aggregation and execution, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest request body buffered, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// HTTP/1.1 keep-alive.
    #[serde(default = "default_true")]
    pub keep_alive: bool,
}

impl ServerSection {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Shutdown timeout as a `Duration`.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            endpoint_path: default_endpoint_path(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            keep_alive: true,
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_endpoint_path() -> String {
    "/graphql".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// `[headers]`: prefixes used by the default header matchers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HeadersSection {
    /// Prefix for permanent headers in backend metadata.
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,

    /// Wire header prefix carrying backend metadata.
    #[serde(default = "default_metadata_header_prefix")]
    pub metadata_header_prefix: String,
}

impl Default for HeadersSection {
    fn default() -> Self {
        Self {
            metadata_prefix: default_metadata_prefix(),
            metadata_header_prefix: default_metadata_header_prefix(),
        }
    }
}

fn default_metadata_prefix() -> String {
    "grpcgateway-".to_string()
}

fn default_metadata_header_prefix() -> String {
    "Grpc-Metadata-".to_string()
}

/// `[cors]`: the CORS middleware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsSection {
    /// Install the CORS middleware.
    #[serde(default)]
    pub enabled: bool,

    /// `Access-Control-Max-Age` in seconds.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age_secs: default_cors_max_age(),
        }
    }
}

fn default_cors_max_age() -> u64 {
    1_728_000
}

/// `[request_id]`: the request ID middleware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RequestIdSection {
    /// Install the request ID middleware.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Adopt valid inbound `x-request-id` headers.
    #[serde(default)]
    pub trust_incoming: bool,
}

impl Default for RequestIdSection {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_incoming: false,
        }
    }
}

/// `[telemetry.logging]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Install a subscriber.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[telemetry.metrics]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus recorder and serve it.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path the gateway serves metrics on.
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Histogram bucket boundaries for request duration, in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

/// `[telemetry]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics.
    #[serde(default)]
    pub metrics: MetricsSection,
}

fn default_true() -> bool {
    true
}

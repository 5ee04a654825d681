//! The root configuration type.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::{
    CorsSection, HeadersSection, RequestIdSection, ServerSection, TelemetrySection,
};

/// Complete gateway configuration.
///
/// ```
/// use mosaic_config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.server.endpoint_path, "/graphql");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Listener and endpoint.
    #[serde(default)]
    pub server: ServerSection,

    /// Header matcher prefixes.
    #[serde(default)]
    pub headers: HeadersSection,

    /// CORS middleware.
    #[serde(default)]
    pub cors: CorsSection,

    /// Request ID middleware.
    #[serde(default)]
    pub request_id: RequestIdSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl GatewayConfig {
    /// Checks values that parse but cannot be served.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        validate_path("server.endpoint_path", &self.server.endpoint_path)?;

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.headers.metadata_prefix.is_empty() {
            return Err(ConfigError::invalid_value(
                "headers.metadata_prefix",
                "must not be empty",
            ));
        }
        if self.headers.metadata_header_prefix.is_empty() {
            return Err(ConfigError::invalid_value(
                "headers.metadata_header_prefix",
                "must not be empty",
            ));
        }

        let metrics = &self.telemetry.metrics;
        if metrics.enabled {
            validate_path("telemetry.metrics.path", &metrics.path)?;
            if metrics.path == self.server.endpoint_path || metrics.path == "/health" {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.path",
                    format!("{} is already routed", metrics.path),
                ));
            }
            if metrics.histogram_buckets.is_empty()
                || metrics.histogram_buckets.windows(2).any(|w| w[0] >= w[1])
            {
                return Err(ConfigError::invalid_value(
                    "telemetry.metrics.histogram_buckets",
                    "must be a non-empty, strictly increasing list",
                ));
            }
        }

        Ok(())
    }

    /// Debug logging in pretty format.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = mosaic_telemetry::LogFormat::Pretty;
        config.cors.enabled = true;
        config
    }

    /// Info logging in JSON format.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = mosaic_telemetry::LogFormat::Json;
        config
    }
}

fn validate_path(field: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, format!("must start with '/': {path}")))
    }
}

//! Combined logging and metrics settings.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Settings for [`init_telemetry`](crate::init_telemetry).
///
/// ```
/// use mosaic_telemetry::{LogFormat, TelemetryConfig};
///
/// let config = TelemetryConfig::development();
/// assert_eq!(config.logging.format, LogFormat::Pretty);
/// assert!(config.metrics.enabled);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Subscriber settings.
    pub logging: LogConfig,

    /// Prometheus recorder settings.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Starts a builder from the production defaults.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Pretty debug logs, metrics on.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            metrics: MetricsConfig::default(),
        }
    }

    /// JSON info logs, metrics on.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Neither a subscriber nor a recorder is installed.
    ///
    /// Useful in tests, where global state is shared across cases.
    #[must_use]
    pub fn disabled() -> Self {
        let mut config = Self::default();
        config.logging.enabled = false;
        config.metrics.enabled = false;
        config
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Replaces the logging settings.
    #[must_use]
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Replaces the metrics settings.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;

    #[test]
    fn test_builder_keeps_unset_defaults() {
        let config = TelemetryConfig::builder()
            .logging(LogConfig {
                level: "mosaic_server=trace".to_string(),
                ..LogConfig::production()
            })
            .build();

        assert_eq!(config.logging.level, "mosaic_server=trace");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn test_disabled() {
        let config = TelemetryConfig::disabled();
        assert!(!config.logging.enabled);
        assert!(!config.metrics.enabled);
    }
}

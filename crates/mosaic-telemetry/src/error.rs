//! Telemetry errors.

use thiserror::Error;

/// Failure to set up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder could not be built or installed.
    #[error("metrics setup failed: {0}")]
    MetricsInit(String),

    /// The log filter was rejected or a subscriber is already set.
    #[error("logging setup failed: {0}")]
    LoggingInit(String),

    /// A setting could not be interpreted.
    #[error("invalid telemetry setting: {0}")]
    InvalidConfig(String),
}

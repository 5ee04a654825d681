//! Prometheus metrics for Mosaic.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mosaic_requests_total` | Counter | `outcome` | Requests by outcome |
//! | `mosaic_request_duration_seconds` | Histogram | `outcome` | Request latency |
//! | `mosaic_in_flight_requests` | Gauge | - | In-flight requests |
//! | `mosaic_connection_failures_total` | Counter | `handler` | Failed backend connections |
//! | `mosaic_schema_fields` | Histogram | `root` | Fields per aggregated schema |
//!
//! The exposition text is rendered with [`render_metrics`], which the
//! gateway server serves on its metrics path.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const REQUESTS_TOTAL: &str = "mosaic_requests_total";
const REQUEST_DURATION: &str = "mosaic_request_duration_seconds";
const IN_FLIGHT: &str = "mosaic_in_flight_requests";
const CONNECTION_FAILURES: &str = "mosaic_connection_failures_total";
const SCHEMA_FIELDS: &str = "mosaic_schema_fields";

/// Default metrics path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Path the gateway serves the exposition text on.
    pub path: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: DEFAULT_METRICS_PATH.to_string(),
            // 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the buckets are invalid or a
/// recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of gateway requests by outcome");
    describe_histogram!(REQUEST_DURATION, "Gateway request duration in seconds");
    describe_gauge!(IN_FLIGHT, "Number of gateway requests currently being processed");
    describe_counter!(
        CONNECTION_FAILURES,
        "Backend connections that failed to open, by handler"
    );
    describe_histogram!(SCHEMA_FIELDS, "Number of fields in each aggregated schema root");
}

/// Terminal classification of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    /// Executed without engine errors.
    Ok,
    /// Executed; the engine reported errors.
    EngineError,
    /// Stopped by a middleware.
    MiddlewareError,
    /// A backend connection failed to open.
    ConnectionError,
    /// The aggregated schema was rejected.
    SchemaError,
    /// The request could not be parsed.
    ParseError,
    /// The request deadline elapsed.
    Timeout,
}

impl RequestOutcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::EngineError => "engine_error",
            Self::MiddlewareError => "middleware_error",
            Self::ConnectionError => "connection_error",
            Self::SchemaError => "schema_error",
            Self::ParseError => "parse_error",
            Self::Timeout => "timeout",
        }
    }
}

/// Records a completed request.
pub fn record_request(outcome: RequestOutcome, duration: Duration) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(REQUEST_DURATION, "outcome" => outcome.as_str()).record(duration.as_secs_f64());
}

/// Records a backend connection that failed to open.
pub fn record_connection_failure(handler: &str) {
    counter!(CONNECTION_FAILURES, "handler" => handler.to_string()).increment(1);
}

/// Records the size of an aggregated schema.
pub fn record_schema_fields(query: usize, mutation: usize) {
    histogram!(SCHEMA_FIELDS, "root" => "query").record(query as f64);
    histogram!(SCHEMA_FIELDS, "root" => "mutation").record(mutation as f64);
}

/// Guard that tracks an in-flight request.
///
/// Increments the gauge on creation and decrements it on drop, so the
/// gauge stays correct when a request future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.path, "/metrics");
        assert_eq!(config.duration_buckets.len(), 12);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RequestOutcome::Ok.as_str(), "ok");
        assert_eq!(RequestOutcome::ConnectionError.as_str(), "connection_error");
        assert_eq!(RequestOutcome::Timeout.as_str(), "timeout");
    }

    #[test]
    fn test_record_functions_without_recorder() {
        record_request(RequestOutcome::Ok, Duration::from_millis(10));
        record_connection_failure("users");
        record_schema_fields(3, 1);
        drop(InFlightGuard::new());
    }

    #[test]
    fn test_disabled_metrics() {
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        assert!(init_metrics(&config).is_ok());
    }
}

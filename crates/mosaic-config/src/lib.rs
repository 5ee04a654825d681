//! Typed, layered configuration for the Mosaic gateway.
//!
//! Sources are applied in order: built-in defaults, an optional TOML or
//! JSON file, then `MOSAIC__SECTION__KEY` environment variables. Unknown
//! fields are rejected.
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! endpoint_path = "/graphql"
//! request_timeout_ms = 30000
//!
//! [headers]
//! metadata_prefix = "grpcgateway-"
//! metadata_header_prefix = "Grpc-Metadata-"
//!
//! [cors]
//! enabled = true
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! path = "/metrics"
//! ```

mod config;
mod error;
mod loader;
mod schema;

pub use config::GatewayConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use mosaic_telemetry::LogFormat;
pub use schema::{
    CorsSection, HeadersSection, LoggingSection, MetricsSection, RequestIdSection, ServerSection,
    TelemetrySection,
};

//! File loading through real temporary files.

use std::io::Write;

use mosaic_config::{ConfigError, ConfigLoader, LogFormat};
use tempfile::Builder;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_complete_toml_file() {
    let file = write_temp(
        ".toml",
        r#"
        [server]
        http_addr = "127.0.0.1:7000"
        endpoint_path = "/api/graphql"
        request_timeout_ms = 5000
        shutdown_timeout_secs = 5
        keep_alive = false

        [headers]
        metadata_prefix = "gw-"
        metadata_header_prefix = "X-Meta-"

        [cors]
        enabled = true
        max_age_secs = 600

        [request_id]
        enabled = true
        trust_incoming = true

        [telemetry.logging]
        level = "warn"
        format = "pretty"

        [telemetry.metrics]
        enabled = true
        path = "/internal/metrics"
        histogram_buckets = [0.01, 0.1, 1.0]
        "#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.server.http_addr, "127.0.0.1:7000");
    assert_eq!(config.server.endpoint_path, "/api/graphql");
    assert_eq!(config.server.request_timeout().as_millis(), 5000);
    assert!(!config.server.keep_alive);
    assert_eq!(config.headers.metadata_prefix, "gw-");
    assert_eq!(config.cors.max_age_secs, 600);
    assert!(config.request_id.trust_incoming);
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    assert_eq!(config.telemetry.metrics.path, "/internal/metrics");
}

#[test]
fn loads_json_file() {
    let file = write_temp(".json", r#"{"server": {"endpoint_path": "/q"}}"#);
    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
    assert_eq!(config.server.endpoint_path, "/q");
    assert_eq!(config.server.http_addr, "0.0.0.0:8080");
}

#[test]
fn rejects_unknown_extension() {
    let file = write_temp(".yaml", "server: {}");
    let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[test]
fn rejects_unknown_field_in_file() {
    let file = write_temp(".toml", "[server]\nmax_connections = 10");
    let err = ConfigLoader::new().with_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_connections"));
}

#[test]
fn missing_file_is_an_error_unless_optional() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mosaic.toml");

    let err = ConfigLoader::new().with_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));

    let config = ConfigLoader::new()
        .with_optional_file(&path)
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(config.server.endpoint_path, "/graphql");
}

//! Liveness endpoint.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    status: String,
    service: String,
    version: String,
    handlers: usize,
    uptime_seconds: u64,
}

impl HealthStatus {
    /// Creates a healthy status.
    #[must_use]
    pub fn healthy(
        service: impl Into<String>,
        version: impl Into<String>,
        handlers: usize,
        uptime: Duration,
    ) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.into(),
            version: version.into(),
            handlers,
            uptime_seconds: uptime.as_secs(),
        }
    }

    /// Returns the status string.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns the service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handlers(&self) -> usize {
        self.handlers
    }

    /// Returns the uptime in seconds.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.uptime_seconds
    }
}

/// Liveness check. The gateway is healthy while it is serving.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    service: String,
    version: String,
    start_time: Instant,
}

impl HealthCheck {
    /// Creates a health check reporting `service` and `version`.
    #[must_use]
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            start_time: Instant::now(),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self, handlers: usize) -> HealthStatus {
        HealthStatus::healthy(
            self.service.clone(),
            self.version.clone(),
            handlers,
            self.start_time.elapsed(),
        )
    }
}

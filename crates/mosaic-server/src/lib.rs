//! # Mosaic Server
//!
//! Request-time schema aggregation and the HTTP server around it.
//!
//! - [`HandlerRegistry`]: handlers validated at registration
//! - [`aggregate`]: per-request connection fan-out and schema merge
//! - [`ServeMux`]: the gateway entry point
//! - [`Server`]: hyper HTTP/1 server with graceful shutdown

#![doc(html_root_url = "https://docs.rs/mosaic-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod error;
pub mod health;
pub mod mux;
pub mod registry;
pub mod response;
pub mod server;
pub mod shutdown;

pub use aggregator::{aggregate, AggregateError};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{RegistryError, ServerError};
pub use health::{HealthCheck, HealthStatus};
pub use mux::{ErrorHandler, ServeMux, ServeMuxBuilder};
pub use registry::HandlerRegistry;
pub use response::{write_response, HttpResponse, ResponseBody};
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};

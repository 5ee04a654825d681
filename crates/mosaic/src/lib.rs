//! # Mosaic
//!
//! **Request-time GraphQL schema aggregation gateway**
//!
//! Mosaic exposes many backend services behind one GraphQL endpoint. On
//! every request it opens a connection to each registered backend, collects
//! the query and mutation fields each one contributes, merges them into a
//! fresh schema and executes the request against it. Later handlers win
//! field-name conflicts. Every connection opened for a request is released
//! exactly once, whatever the outcome.
//!
//! ```text
//! HTTP → middleware → metadata → open connections → merge fields
//!      → build schema → execute → response headers → JSON envelope
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use mosaic::Gateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mosaic::Error> {
//!     Gateway::from_env(MyEngine::default())?
//!         .handler(users_backend())?
//!         .handler(orders_backend())?
//!         .run()
//!         .await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/mosaic/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod gateway;

pub use gateway::{Error, Gateway, DEFAULT_CONFIG_FILE};

pub use mosaic_config as config;
pub use mosaic_core as core;
pub use mosaic_middleware as middleware;
pub use mosaic_server as server;
pub use mosaic_telemetry as telemetry;

/// Common imports.
pub mod prelude {
    pub use crate::{Error, Gateway};

    pub use mosaic_config::{ConfigLoader, GatewayConfig};
    pub use mosaic_core::{
        BoxFuture, ConnectError, ExecutionResult, FieldSet, GatewayError, GraphqlHandler,
        Metadata, MetadataAnnotator, QueryEngine, Release, RequestContext, SchemaConfig,
        SchemaError,
    };
    pub use mosaic_middleware::{FnMiddleware, Middleware, MiddlewareContext, MiddlewareError};
    pub use mosaic_server::{ServeMux, Server, ServerConfig, ShutdownSignal};
}

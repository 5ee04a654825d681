//! Wires a [`GatewayConfig`] into a runnable server.

use std::time::Duration;

use mosaic_config::{ConfigError, ConfigLoader, GatewayConfig, DEFAULT_ENV_PREFIX};
use mosaic_core::{GatewayError, GraphqlHandler, HeaderTranslator, MetadataAnnotator, QueryEngine};
use mosaic_middleware::stages::{CorsMiddleware, RequestIdMiddleware};
use mosaic_middleware::Middleware;
use mosaic_server::{RegistryError, ServeMux, ServeMuxBuilder, Server, ServerConfig, ServerError};
use mosaic_telemetry::{LogConfig, LogFormat, MetricsConfig, TelemetryConfig, TelemetryError};

/// Config file read by [`Gateway::from_env`] when present.
pub const DEFAULT_CONFIG_FILE: &str = "mosaic.toml";

/// Errors from assembling or running a gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A handler failed schema validation at registration.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Logging or metrics could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server failed to bind or serve.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// A gateway under construction.
///
/// Built-in stages run first, in this order: request ID (when enabled),
/// then CORS (when enabled). Middleware added with
/// [`middleware`](Self::middleware) runs after them in call order.
///
/// ```rust,ignore
/// use mosaic::Gateway;
///
/// Gateway::from_env(engine)?
///     .handler(users)?
///     .handler(orders)?
///     .run()
///     .await?;
/// ```
pub struct Gateway<E: QueryEngine> {
    config: GatewayConfig,
    mux: ServeMuxBuilder<E>,
}

impl<E: QueryEngine> Gateway<E> {
    /// Creates a gateway from an already loaded configuration.
    pub fn new(engine: E, config: GatewayConfig) -> Self {
        let headers = &config.headers;
        let mut mux = ServeMux::builder(engine)
            .header_translator(HeaderTranslator::with_prefixes(
                headers.metadata_prefix.clone(),
                headers.metadata_header_prefix.clone(),
            ))
            .request_timeout(config.server.request_timeout());

        if config.request_id.enabled {
            mux = if config.request_id.trust_incoming {
                mux.middleware(RequestIdMiddleware::trust_incoming())
            } else {
                mux.middleware(RequestIdMiddleware::new())
            };
        }
        if config.cors.enabled {
            mux = mux.middleware(
                CorsMiddleware::new().max_age(Duration::from_secs(config.cors.max_age_secs)),
            );
        }

        Self { config, mux }
    }

    /// Loads `.env`, then `mosaic.toml` if present, then `MOSAIC__*`
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any layer fails to load or the result
    /// does not validate.
    pub fn from_env(engine: E) -> Result<Self, Error> {
        let config = ConfigLoader::new()
            .with_dotenv()?
            .with_optional_file(DEFAULT_CONFIG_FILE)?
            .with_env_prefix(DEFAULT_ENV_PREFIX)
            .load()?;
        Ok(Self::new(engine, config))
    }

    /// Registers a backend handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the handler's fields alone do not
    /// form a valid schema.
    pub fn handler<H: GraphqlHandler<E::Field>>(mut self, handler: H) -> Result<Self, Error> {
        self.mux = self.mux.handler(handler)?;
        Ok(self)
    }

    /// Appends a middleware stage after the built-in ones.
    #[must_use]
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.mux = self.mux.middleware(middleware);
        self
    }

    /// Adds a metadata annotator.
    #[must_use]
    pub fn metadata_annotator<A: MetadataAnnotator>(mut self, annotator: A) -> Self {
        self.mux = self.mux.metadata_annotator(annotator);
        self
    }

    /// Replaces the engine error observer.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[GatewayError]) + Send + Sync + 'static,
    {
        self.mux = self.mux.error_handler(handler);
        self
    }

    /// Returns the configuration this gateway was built from.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// HTTP settings derived from the configuration.
    pub fn server_config(&self) -> ServerConfig {
        let server = &self.config.server;
        let mut builder = ServerConfig::builder()
            .http_addr(server.http_addr.clone())
            .endpoint_path(server.endpoint_path.clone())
            .request_timeout(server.request_timeout())
            .max_body_bytes(server.max_body_bytes)
            .shutdown_timeout(server.shutdown_timeout())
            .keep_alive(server.keep_alive);
        if self.config.telemetry.metrics.enabled {
            builder = builder.metrics_path(self.config.telemetry.metrics.path.clone());
        }
        builder.build()
    }

    /// Logging and metrics settings derived from the configuration.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let logging = &self.config.telemetry.logging;
        let base = match logging.format {
            LogFormat::Pretty => LogConfig::development(),
            LogFormat::Json => LogConfig::production(),
        };
        let metrics = &self.config.telemetry.metrics;

        TelemetryConfig::builder()
            .logging(LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                format: logging.format,
                ..base
            })
            .metrics(MetricsConfig {
                enabled: metrics.enabled,
                path: metrics.path.clone(),
                duration_buckets: metrics.histogram_buckets.clone(),
            })
            .build()
    }

    /// Builds the server without touching global telemetry state.
    pub fn into_server(self) -> Server<E> {
        let config = self.server_config();
        Server::new(config, self.mux.build())
    }

    /// Initializes telemetry and serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if telemetry cannot be initialized or the address
    /// cannot be bound.
    pub async fn run(self) -> Result<(), Error> {
        mosaic_telemetry::init_telemetry(&self.telemetry_config())?;
        tracing::info!(
            endpoint = %self.config.server.endpoint_path,
            cors = self.config.cors.enabled,
            "Starting gateway"
        );
        self.into_server().run().await?;
        Ok(())
    }
}

impl<E: QueryEngine> std::fmt::Debug for Gateway<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("mux", &self.mux)
            .finish()
    }
}

//! HTTP server.
//!
//! Accepts TCP connections, serves each one with hyper's HTTP/1 codec on
//! its own task and routes requests:
//!
//! - the configured endpoint path goes to the [`ServeMux`]
//! - `GET /health` returns a liveness JSON
//! - `GET` on the metrics path returns Prometheus text, when configured
//! - everything else gets a 404 envelope
//!
//! # Example
//!
//! ```rust,ignore
//! use mosaic_server::{Server, ServerConfig, ServeMux};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mux = ServeMux::builder(engine).handler(users)?.build();
//!     let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//!
//!     Server::new(config, mux).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use mosaic_core::{QueryEngine, RequestParseError};
use mosaic_telemetry::render_metrics;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::HealthCheck;
use crate::mux::ServeMux;
use crate::response::{json_response, metrics_response, not_found, HttpResponse};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The gateway HTTP server.
pub struct Server<E: QueryEngine> {
    config: ServerConfig,
    mux: ServeMux<E>,
    health: HealthCheck,
}

impl<E: QueryEngine> Server<E> {
    /// Creates a server that routes its endpoint to `mux`.
    #[must_use]
    pub fn new(config: ServerConfig, mux: ServeMux<E>) -> Self {
        Self {
            config,
            mux,
            health: HealthCheck::new("mosaic", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the mux.
    #[must_use]
    pub fn mux(&self) -> &ServeMux<E> {
        &self.mux
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("Invalid address '{}': {}", self.config.http_addr(), e))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("Failed to bind to {}: {}", addr, e)))?;

        self.run_with_listener(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then waits up to the shutdown timeout for open connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            endpoint = self.config.endpoint_path(),
            handlers = self.mux.handlers().len(),
            "Gateway listening"
        );

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                    tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            active = tracker.active_connections(),
            "Waiting for connections to close"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                tracing::info!("All connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "Shutdown timeout reached"
                );
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.config.keep_alive())
            .serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(remote = %remote_addr, "closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, req: Request<Incoming>) -> Result<HttpResponse, Infallible> {
        let path = req.uri().path();
        tracing::debug!(method = %req.method(), path, "request");

        if path == self.config.endpoint_path() {
            return Ok(self.handle_gateway(req).await);
        }

        if req.method() == Method::GET {
            if path == "/health" {
                return Ok(json_response(
                    StatusCode::OK,
                    &self.health.status(self.mux.handlers().len()),
                ));
            }
            if self.config.metrics_path() == Some(path) {
                if let Some(text) = render_metrics() {
                    return Ok(metrics_response(text));
                }
            }
        }

        Ok(not_found(path))
    }

    async fn handle_gateway(&self, req: Request<Incoming>) -> HttpResponse {
        let (parts, body) = req.into_parts();
        let limit = self.config.max_body_bytes();

        let limited = Limited::new(body, limit);
        let collected = tokio::time::timeout(self.config.request_timeout(), limited.collect()).await;
        let error = match collected {
            Ok(Ok(collected)) => {
                return self.mux.serve(Request::from_parts(parts, collected.to_bytes())).await;
            }
            Ok(Err(e)) if e.is::<LengthLimitError>() => RequestParseError::BodyTooLarge(limit),
            Ok(Err(e)) => RequestParseError::Body(e.to_string()),
            Err(_) => RequestParseError::Body("timed out".to_string()),
        };

        tracing::warn!(error = %error, "failed to collect request body");
        self.mux
            .serve_with_body_error(Request::from_parts(parts, Bytes::new()), error)
            .await
    }
}

impl<E: QueryEngine> std::fmt::Debug for Server<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("mux", &self.mux)
            .finish_non_exhaustive()
    }
}

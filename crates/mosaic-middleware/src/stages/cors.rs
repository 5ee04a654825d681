//! CORS (Cross-Origin Resource Sharing) middleware.
//!
//! Adds the following headers to every response:
//!
//! - `Access-Control-Allow-Origin`: the request host
//! - `Access-Control-Allow-Credentials`: `true`
//! - `Access-Control-Allow-Methods`: `GET, POST, OPTIONS`
//! - `Access-Control-Max-Age`: `1728000` (20 days)
//!
//! The host is taken from the request URI authority, falling back to the
//! `Host` header. When neither is present the origin header is omitted.

use crate::context::MiddlewareContext;
use crate::error::MiddlewareError;
use crate::middleware::Middleware;
use http::{header, HeaderMap, HeaderValue};
use mosaic_core::{BoxFuture, Request};
use std::time::Duration;

/// Default preflight cache duration.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(1_728_000);

/// Default allowed methods.
pub const DEFAULT_ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// CORS middleware reflecting the request host as the allowed origin.
///
/// # Example
///
/// ```
/// use mosaic_middleware::stages::CorsMiddleware;
/// use std::time::Duration;
///
/// let cors = CorsMiddleware::new().max_age(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allow_methods: HeaderValue,
    max_age: HeaderValue,
}

impl CorsMiddleware {
    /// Creates the middleware with the default methods and max age.
    #[must_use]
    pub fn new() -> Self {
        Self {
            allow_methods: HeaderValue::from_static(DEFAULT_ALLOW_METHODS),
            max_age: HeaderValue::from(DEFAULT_MAX_AGE.as_secs()),
        }
    }

    /// Overrides the preflight cache duration.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = HeaderValue::from(max_age.as_secs());
        self
    }

    fn request_host(request: &Request) -> Option<HeaderValue> {
        if let Some(authority) = request.uri().authority() {
            return HeaderValue::from_str(authority.as_str()).ok();
        }
        request.headers().get(header::HOST).cloned()
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        response_headers: &'a mut HeaderMap,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
        Box::pin(async move {
            if let Some(host) = Self::request_host(request) {
                response_headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, host);
            }
            response_headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            response_headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                self.allow_methods.clone(),
            );
            response_headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
            Ok(())
        })
    }
}

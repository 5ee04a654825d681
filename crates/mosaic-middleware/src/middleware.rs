//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every pipeline stage
//! implements. A middleware runs before the gateway dispatches the request:
//! it may enrich the [`MiddlewareContext`], write response headers, or stop
//! the request by returning an error.
//!
//! # Example
//!
//! ```
//! use http::HeaderMap;
//! use mosaic_core::{BoxFuture, Request};
//! use mosaic_middleware::{Middleware, MiddlewareContext, MiddlewareError};
//!
//! struct RequireTenant;
//!
//! impl Middleware for RequireTenant {
//!     fn name(&self) -> &'static str {
//!         "require_tenant"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: &'a Request,
//!         _response_headers: &'a mut HeaderMap,
//!     ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
//!         Box::pin(async move {
//!             let tenant = request
//!                 .headers()
//!                 .get("x-tenant")
//!                 .and_then(|v| v.to_str().ok())
//!                 .ok_or_else(|| MiddlewareError::coded("UNAUTHENTICATED", "missing tenant"))?;
//!             ctx.metadata_mut().insert("x-tenant", tenant);
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::error::MiddlewareError;
use http::HeaderMap;
use mosaic_core::{BoxFuture, Request};

/// A pre-dispatch pipeline stage.
///
/// # Invariants
///
/// - Stages run in registration order
/// - The first error stops the pipeline; later stages and dispatch are skipped
/// - Response headers written before a failure are still sent
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this stage.
    ///
    /// This name is used for logging and debugging.
    fn name(&self) -> &'static str;

    /// Processes the request.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The mutable middleware context
    /// * `request` - The incoming request with its collected body
    /// * `response_headers` - Headers added to whatever response is produced
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        response_headers: &'a mut HeaderMap,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>>;
}

/// A middleware created from a synchronous function.
///
/// # Example
///
/// ```
/// use mosaic_middleware::{FnMiddleware, MiddlewareError};
///
/// let deny_all = FnMiddleware::new("deny_all", |_ctx, _req, _headers| {
///     Err(MiddlewareError::rejected("maintenance"))
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut MiddlewareContext, &Request, &mut HeaderMap) -> Result<(), MiddlewareError>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut MiddlewareContext, &Request, &mut HeaderMap) -> Result<(), MiddlewareError>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        response_headers: &'a mut HeaderMap,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
        let result = (self.func)(ctx, request, response_headers);
        Box::pin(std::future::ready(result))
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

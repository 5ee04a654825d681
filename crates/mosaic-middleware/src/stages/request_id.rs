//! Request ID middleware.
//!
//! Every request carries a [`RequestId`] (UUID v7) used for log
//! correlation. This stage optionally adopts a valid inbound
//! `X-Request-ID` header and always echoes the final ID on the response.

use crate::context::MiddlewareContext;
use crate::error::MiddlewareError;
use crate::middleware::Middleware;
use http::{HeaderMap, HeaderValue};
use mosaic_core::{BoxFuture, Request, RequestId};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that generates or propagates request IDs.
///
/// # Behavior
///
/// 1. If incoming IDs are trusted and `X-Request-ID` holds a valid UUID, use it
/// 2. Otherwise keep the ID already assigned to the context
/// 3. Add the ID to response headers
#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Creates a middleware that ignores incoming request IDs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a middleware that trusts incoming `X-Request-ID` headers.
    ///
    /// Use this behind trusted proxies that already assign request IDs.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    fn extract_request_id(&self, request: &Request) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::parse)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: &'a Request,
        response_headers: &'a mut HeaderMap,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
        Box::pin(async move {
            if let Some(request_id) = self.extract_request_id(request) {
                ctx.set_request_id(request_id);
            }

            let value = HeaderValue::from_str(&ctx.request_id().to_string())
                .map_err(|e| MiddlewareError::Other(e.into()))?;
            response_headers.insert(REQUEST_ID_HEADER, value);
            Ok(())
        })
    }
}

//! Request-scoped metadata annotators.
//!
//! [`MetadataMiddleware`] registers its annotators on the context of each
//! request it processes. The gateway consults them, after the pipeline,
//! when building backend call metadata. Nothing is registered on shared
//! gateway state.

use crate::context::MiddlewareContext;
use crate::error::MiddlewareError;
use crate::middleware::Middleware;
use http::HeaderMap;
use mosaic_core::{BoxFuture, MetadataAnnotator, Request};
use std::sync::Arc;

/// Middleware that attaches metadata annotators to each request.
///
/// # Example
///
/// ```
/// use mosaic_core::{Metadata, Request, RequestContext};
/// use mosaic_middleware::stages::MetadataMiddleware;
///
/// let middleware = MetadataMiddleware::new(|_: &RequestContext, req: &Request| {
///     Metadata::pairs([("x-method", req.method().as_str())])
/// });
/// ```
#[derive(Clone)]
pub struct MetadataMiddleware {
    annotators: Vec<Arc<dyn MetadataAnnotator>>,
}

impl MetadataMiddleware {
    /// Creates the middleware with one annotator.
    pub fn new<A: MetadataAnnotator>(annotator: A) -> Self {
        Self {
            annotators: vec![Arc::new(annotator)],
        }
    }

    /// Adds another annotator.
    #[must_use]
    pub fn and<A: MetadataAnnotator>(mut self, annotator: A) -> Self {
        self.annotators.push(Arc::new(annotator));
        self
    }
}

impl std::fmt::Debug for MetadataMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataMiddleware")
            .field("annotators", &self.annotators.len())
            .finish()
    }
}

impl Middleware for MetadataMiddleware {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        _request: &'a Request,
        _response_headers: &'a mut HeaderMap,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
        for annotator in &self.annotators {
            ctx.add_shared_annotator(Arc::clone(annotator));
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

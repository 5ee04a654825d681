//! Middleware context types.
//!
//! The [`MiddlewareContext`] carries state through the middleware pipeline.
//! It wraps the [`RequestContext`] later handed to handlers and the query
//! engine, plus the metadata annotators registered for this request only.

use mosaic_core::{Metadata, MetadataAnnotator, RequestContext, RequestId};
use std::fmt;
use std::sync::Arc;

/// Context that flows through the middleware pipeline.
///
/// # Example
///
/// ```
/// use mosaic_core::{Metadata, Request, RequestContext};
/// use mosaic_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.add_annotator(|_: &RequestContext, _: &Request| Metadata::pairs([("tenant", "acme")]));
///
/// let (_request_ctx, annotators) = ctx.into_parts();
/// assert_eq!(annotators.len(), 1);
/// ```
#[derive(Default)]
pub struct MiddlewareContext {
    request: RequestContext,
    annotators: Vec<Arc<dyn MetadataAnnotator>>,
}

impl MiddlewareContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context around an existing request context.
    #[must_use]
    pub fn from_request_context(request: RequestContext) -> Self {
        Self {
            request,
            annotators: Vec::new(),
        }
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> RequestId {
        self.request.request_id()
    }

    /// Replaces the request ID.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request.set_request_id(request_id);
    }

    /// The request context being built.
    pub fn request_context(&self) -> &RequestContext {
        &self.request
    }

    /// Mutable access to the request context.
    pub fn request_context_mut(&mut self) -> &mut RequestContext {
        &mut self.request
    }

    /// Backend call metadata collected so far.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.request.metadata_mut()
    }

    /// Registers an annotator for this request only.
    pub fn add_annotator<A: MetadataAnnotator>(&mut self, annotator: A) {
        self.annotators.push(Arc::new(annotator));
    }

    /// Registers a shared annotator for this request only.
    pub fn add_shared_annotator(&mut self, annotator: Arc<dyn MetadataAnnotator>) {
        self.annotators.push(annotator);
    }

    /// Request-scoped annotators in registration order.
    pub fn annotators(&self) -> &[Arc<dyn MetadataAnnotator>] {
        &self.annotators
    }

    /// Stores a typed extension on the request context.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.request.set_extension(value);
    }

    /// Reads a typed extension from the request context.
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.get_extension()
    }

    /// Splits into the request context and the request-scoped annotators.
    pub fn into_parts(self) -> (RequestContext, Vec<Arc<dyn MetadataAnnotator>>) {
        (self.request, self.annotators)
    }
}

impl fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("request", &self.request)
            .field("annotators", &self.annotators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_round_trip() {
        let mut ctx = MiddlewareContext::new();
        let id = RequestId::new();
        ctx.set_request_id(id);
        assert_eq!(ctx.request_id(), id);
        assert_eq!(ctx.request_context().request_id(), id);
    }

    #[test]
    fn test_extensions_reach_request_context() {
        #[derive(Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = MiddlewareContext::new();
        ctx.set_extension(Tenant("acme"));
        ctx.metadata_mut().insert("x-tenant", "acme");

        let (request, annotators) = ctx.into_parts();
        assert_eq!(request.get_extension::<Tenant>(), Some(&Tenant("acme")));
        assert_eq!(request.metadata().get("x-tenant"), Some("acme"));
        assert!(annotators.is_empty());
    }
}

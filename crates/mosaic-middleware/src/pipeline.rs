//! Ordered, short-circuiting middleware pipeline.
//!
//! Stages run strictly in the order they were added. The first stage that
//! fails stops the pipeline: no later stage runs and the request is never
//! dispatched.

use crate::context::MiddlewareContext;
use crate::error::MiddlewareError;
use crate::middleware::Middleware;
use http::HeaderMap;
use mosaic_core::Request;
use std::fmt;
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The middleware pipeline.
///
/// The pipeline cannot be modified after construction.
///
/// # Example
///
/// ```
/// use http::HeaderMap;
/// use mosaic_core::Request;
/// use mosaic_middleware::{FnMiddleware, MiddlewareContext, Pipeline};
/// use mosaic_middleware::stages::CorsMiddleware;
///
/// let pipeline = Pipeline::builder()
///     .stage(CorsMiddleware::new())
///     .stage(FnMiddleware::new("noop", |_, _, _| Ok(())))
///     .build();
/// assert_eq!(pipeline.stage_names(), ["cors", "noop"]);
///
/// # tokio_test::block_on(async {
/// let mut ctx = MiddlewareContext::new();
/// let mut headers = HeaderMap::new();
/// pipeline.run(&mut ctx, &Request::default(), &mut headers).await.unwrap();
/// # });
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs every stage in order, stopping at the first failure.
    pub async fn run(
        &self,
        ctx: &mut MiddlewareContext,
        request: &Request,
        response_headers: &mut HeaderMap,
    ) -> Result<(), MiddlewareError> {
        for stage in &self.stages {
            tracing::debug!(stage = stage.name(), request_id = %ctx.request_id(), "running middleware");
            if let Err(err) = stage.process(ctx, request, response_headers).await {
                tracing::warn!(
                    stage = stage.name(),
                    request_id = %ctx.request_id(),
                    code = err.code(),
                    error = %err,
                    "middleware rejected request"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Appends a stage through a mutable reference.
    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.stages.push(Arc::new(middleware));
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("stages", &self.stages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnMiddleware;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counting(name: &'static str, counter: Arc<AtomicUsize>) -> impl Middleware {
        FnMiddleware::new(name, move |_: &mut MiddlewareContext, _: &Request, _: &mut HeaderMap| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let pipeline = Pipeline::builder().build();
        assert!(pipeline.is_empty());

        let mut ctx = MiddlewareContext::new();
        let mut headers = HeaderMap::new();
        assert!(pipeline.run(&mut ctx, &Request::default(), &mut headers).await.is_ok());
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut builder = Pipeline::builder();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            builder.push(FnMiddleware::new(
                name,
                move |_: &mut MiddlewareContext, _: &Request, headers: &mut HeaderMap| {
                    order.lock().unwrap().push(name);
                    headers.append("x-stage", http::HeaderValue::from_static(name));
                    Ok(())
                },
            ));
        }
        let pipeline = builder.build();
        assert_eq!(pipeline.stage_count(), 3);

        let mut ctx = MiddlewareContext::new();
        let mut headers = HeaderMap::new();
        pipeline.run(&mut ctx, &Request::default(), &mut headers).await.unwrap();

        assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
        assert_eq!(headers.get_all("x-stage").iter().count(), 3);
    }

    #[tokio::test]
    async fn test_failure_stops_pipeline() {
        let after = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::builder()
            .stage(FnMiddleware::new(
                "reject",
                |_: &mut MiddlewareContext, _: &Request, _: &mut HeaderMap| {
                    Err(MiddlewareError::coded("FORBIDDEN", "nope"))
                },
            ))
            .stage(counting("after", Arc::clone(&after)))
            .build();

        let mut ctx = MiddlewareContext::new();
        let mut headers = HeaderMap::new();
        let err = pipeline
            .run(&mut ctx, &Request::default(), &mut headers)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }
}

//! The gateway entry point.
//!
//! [`ServeMux`] turns one HTTP request into one gateway envelope:
//!
//! 1. the middleware pipeline runs and may stop the request
//! 2. backend metadata is derived from headers and annotators
//! 3. every handler opens a connection and the schema is aggregated
//! 4. the request is parsed and executed against that schema
//! 5. the envelope is written and connections are released
//!
//! Every failure is answered with `200 OK` and a coded error. A body that
//! could not be read still goes through steps 1 and 2 so middleware headers
//! reach the client, then is answered with a parse error.

use http::HeaderMap;
use mosaic_core::{
    parse_request, ErrorCode, GatewayError, GraphqlHandler, GraphqlResponse, HeaderTranslator,
    MetadataAnnotator, QueryEngine, ReleaseGuard, Request, RequestContext, RequestParseError,
};
use mosaic_middleware::{MiddlewareContext, Middleware, Pipeline, PipelineBuilder};
use mosaic_telemetry::{record_request, InFlightGuard, RequestOutcome};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::aggregator::aggregate;
use crate::error::RegistryError;
use crate::registry::HandlerRegistry;
use crate::response::{write_response, HttpResponse};

/// Observer for engine errors.
pub type ErrorHandler = Arc<dyn Fn(&[GatewayError]) + Send + Sync>;

fn default_error_handler(errors: &[GatewayError]) {
    for error in errors {
        tracing::warn!(error = %error, "query execution error");
    }
}

/// Result of dispatching a request past the pipeline.
struct Dispatched {
    response: GraphqlResponse,
    outcome: RequestOutcome,
}

impl Dispatched {
    fn failed(error: GatewayError, outcome: RequestOutcome) -> Self {
        Self {
            response: GraphqlResponse::error(error),
            outcome,
        }
    }

    fn parse_error(ctx: &RequestContext, err: &RequestParseError) -> Self {
        tracing::warn!(request_id = %ctx.request_id(), error = %err, "failed to parse request");
        Self::failed(
            GatewayError::from_code(
                ErrorCode::RequestParse,
                format!("Failed to parse request: {err}"),
            ),
            RequestOutcome::ParseError,
        )
    }
}

/// Aggregates registered handlers into one endpoint.
///
/// # Example
///
/// ```rust
/// use mosaic_core::fixtures::{MockEngine, MockField, StaticHandler};
/// use mosaic_server::ServeMux;
///
/// let mux = ServeMux::builder(MockEngine::new())
///     .handler(StaticHandler::new("users").query("ping", MockField::value("pong")))
///     .unwrap()
///     .build();
///
/// assert_eq!(mux.handlers().len(), 1);
/// ```
pub struct ServeMux<E: QueryEngine> {
    engine: E,
    registry: HandlerRegistry<E::Field>,
    pipeline: Pipeline,
    annotators: Vec<Arc<dyn MetadataAnnotator>>,
    headers: HeaderTranslator,
    error_handler: ErrorHandler,
    request_timeout: Option<Duration>,
}

impl<E: QueryEngine> ServeMux<E> {
    /// Starts building a mux around `engine`.
    #[must_use]
    pub fn builder(engine: E) -> ServeMuxBuilder<E> {
        ServeMuxBuilder::new(engine)
    }

    /// Validates and appends a handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the handler's fields are invalid.
    pub fn register<H: GraphqlHandler<E::Field>>(&mut self, handler: H) -> Result<(), RegistryError> {
        self.registry.register(handler, &self.engine)
    }

    /// The query engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Registered handlers.
    pub fn handlers(&self) -> &HandlerRegistry<E::Field> {
        &self.registry
    }

    /// The middleware pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The header translator.
    pub fn header_translator(&self) -> &HeaderTranslator {
        &self.headers
    }

    /// Serves one request.
    pub async fn serve(&self, request: Request) -> HttpResponse {
        self.serve_inner(request, None).await
    }

    /// Answers a request whose body could not be read.
    ///
    /// The pipeline and annotators still run against `request`, whose body
    /// is ignored. No backend connection is opened.
    pub async fn serve_with_body_error(
        &self,
        request: Request,
        error: RequestParseError,
    ) -> HttpResponse {
        self.serve_inner(request, Some(error)).await
    }

    async fn serve_inner(
        &self,
        request: Request,
        body_error: Option<RequestParseError>,
    ) -> HttpResponse {
        let _in_flight = InFlightGuard::new();
        let started = Instant::now();

        let mut request_ctx = RequestContext::new();
        if let Some(timeout) = self.request_timeout {
            request_ctx = request_ctx.with_timeout(timeout);
        }
        let mut ctx = MiddlewareContext::from_request_context(request_ctx);
        let mut response_headers = HeaderMap::new();

        if let Err(err) = self.pipeline.run(&mut ctx, &request, &mut response_headers).await {
            let response = GraphqlResponse::error(err.into());
            record_request(RequestOutcome::MiddlewareError, started.elapsed());
            return write_response(&response, response_headers);
        }

        let (mut request_ctx, request_annotators) = ctx.into_parts();
        let incoming = self.headers.incoming_metadata(request.headers());
        request_ctx.metadata_mut().extend(incoming);
        for annotator in self.annotators.iter().chain(&request_annotators) {
            let metadata = annotator.annotate(&request_ctx, &request);
            request_ctx.metadata_mut().extend(metadata);
        }

        let mut guard = ReleaseGuard::new();
        let span = tracing::debug_span!("dispatch", request_id = %request_ctx.request_id());
        let dispatch = self
            .dispatch(&request_ctx, &request, body_error, &mut guard)
            .instrument(span);
        let dispatched = match request_ctx.deadline() {
            Some(deadline) => tokio::time::timeout_at(deadline.into(), dispatch)
                .await
                .unwrap_or_else(|_| {
                    tracing::warn!(
                        request_id = %request_ctx.request_id(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request deadline exceeded"
                    );
                    Dispatched::failed(
                        GatewayError::from_code(ErrorCode::RequestTimeout, "Request timed out"),
                        RequestOutcome::Timeout,
                    )
                }),
            None => dispatch.await,
        };

        self.headers.apply_outgoing(
            &request_ctx.response_metadata().snapshot(),
            &mut response_headers,
        );
        let response = write_response(&dispatched.response, response_headers);
        guard.release();

        record_request(dispatched.outcome, started.elapsed());
        response
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        request: &Request,
        body_error: Option<RequestParseError>,
        guard: &mut ReleaseGuard,
    ) -> Dispatched {
        if let Some(err) = body_error {
            return Dispatched::parse_error(ctx, &err);
        }

        let schema = match aggregate(&self.engine, &self.registry, ctx, guard).await {
            Ok(schema) => schema,
            Err(err) => return Dispatched::failed(err.to_gateway_error(), err.outcome()),
        };

        let parsed = match parse_request(request.method(), request.uri(), request.body()) {
            Ok(parsed) => parsed,
            Err(e) => return Dispatched::parse_error(ctx, &e),
        };

        let result = self.engine.execute(&schema, &parsed, ctx).await;
        let outcome = if result.has_errors() {
            (self.error_handler)(&result.errors);
            RequestOutcome::EngineError
        } else {
            RequestOutcome::Ok
        };

        Dispatched {
            response: result.into(),
            outcome,
        }
    }
}

impl<E: QueryEngine> fmt::Debug for ServeMux<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMux")
            .field("handlers", &self.registry)
            .field("pipeline", &self.pipeline)
            .field("annotators", &self.annotators.len())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Setup-time builder for [`ServeMux`].
pub struct ServeMuxBuilder<E: QueryEngine> {
    engine: E,
    registry: HandlerRegistry<E::Field>,
    pipeline: PipelineBuilder,
    annotators: Vec<Arc<dyn MetadataAnnotator>>,
    headers: HeaderTranslator,
    error_handler: Option<ErrorHandler>,
    request_timeout: Option<Duration>,
}

impl<E: QueryEngine> ServeMuxBuilder<E> {
    /// Creates a builder with no handlers and no middleware.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            registry: HandlerRegistry::new(),
            pipeline: PipelineBuilder::new(),
            annotators: Vec::new(),
            headers: HeaderTranslator::default(),
            error_handler: None,
            request_timeout: None,
        }
    }

    /// Appends a middleware; stages run in the order they are added.
    #[must_use]
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.pipeline.push(middleware);
        self
    }

    /// Adds an annotator consulted on every request.
    #[must_use]
    pub fn metadata_annotator<A: MetadataAnnotator>(mut self, annotator: A) -> Self {
        self.annotators.push(Arc::new(annotator));
        self
    }

    /// Replaces the wire-to-backend header matcher.
    #[must_use]
    pub fn incoming_header_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.headers = self.headers.incoming_matcher(matcher);
        self
    }

    /// Replaces the backend-to-wire header matcher.
    #[must_use]
    pub fn outgoing_header_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.headers = self.headers.outgoing_matcher(matcher);
        self
    }

    /// Replaces both header matchers.
    #[must_use]
    pub fn header_translator(mut self, translator: HeaderTranslator) -> Self {
        self.headers = translator;
        self
    }

    /// Replaces the engine error observer.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[GatewayError]) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Bounds aggregation and execution of each request.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Validates and appends a handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the handler's fields are invalid.
    pub fn handler<H: GraphqlHandler<E::Field>>(mut self, handler: H) -> Result<Self, RegistryError> {
        self.registry.register(handler, &self.engine)?;
        Ok(self)
    }

    /// Builds the mux.
    #[must_use]
    pub fn build(self) -> ServeMux<E> {
        ServeMux {
            engine: self.engine,
            registry: self.registry,
            pipeline: self.pipeline.build(),
            annotators: self.annotators,
            headers: self.headers,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(default_error_handler)),
            request_timeout: self.request_timeout,
        }
    }
}

impl<E: QueryEngine> fmt::Debug for ServeMuxBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServeMuxBuilder")
            .field("handlers", &self.registry)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

//! Test fixtures for Mosaic development and testing.
//!
//! - [`MockEngine`]: a small field-selection engine. It understands
//!   documents of the form `{ a b }` or `mutation { c }`; no arguments,
//!   aliases or nested selections.
//! - [`StaticHandler`]: a handler with configurable fields whose
//!   [`HandlerCounters`] record how many connections were opened and
//!   released.
//!
//! # Example
//!
//! ```
//! use mosaic_core::fixtures::{MockEngine, MockField, StaticHandler};
//!
//! let handler = StaticHandler::new("users").query("ping", MockField::value("pong"));
//! let counters = handler.counters();
//! assert_eq!(counters.opened(), 0);
//! # let _ = (handler, MockEngine::new());
//! ```

use crate::context::RequestContext;
use crate::engine::{ExecutionResult, QueryEngine};
use crate::error::{ConnectError, GatewayError, SchemaError};
use crate::handler::{GraphqlHandler, Release};
use crate::request::GraphqlRequest;
use crate::schema::{FieldSet, ObjectConfig, SchemaConfig};
use crate::types::BoxFuture;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Resolver = Arc<dyn Fn(&RequestContext, &Map<String, Value>) -> Result<Value, String> + Send + Sync>;

/// Field definition understood by [`MockEngine`].
#[derive(Clone)]
pub struct MockField {
    resolve: Resolver,
}

impl MockField {
    /// A field computed from the request context and variables.
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn(&RequestContext, &Map<String, Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    /// A field that always resolves to `value`.
    pub fn value(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(move |_, _| Ok(value.clone()))
    }

    /// A field whose resolver always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_, _| Err(message.clone()))
    }

    /// Runs the resolver.
    pub fn resolve(&self, ctx: &RequestContext, variables: &Map<String, Value>) -> Result<Value, String> {
        (self.resolve)(ctx, variables)
    }
}

impl fmt::Debug for MockField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MockField")
    }
}

/// Executable schema produced by [`MockEngine`].
#[derive(Debug)]
pub struct MockSchema {
    query: ObjectConfig<MockField>,
    mutation: Option<ObjectConfig<MockField>>,
}

impl MockSchema {
    /// Query field names in order.
    pub fn query_fields(&self) -> Vec<&str> {
        self.query.fields.names().collect()
    }

    /// Mutation field names in order.
    pub fn mutation_fields(&self) -> Vec<&str> {
        self.mutation
            .as_ref()
            .map(|m| m.fields.names().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct EngineStats {
    schemas_built: AtomicUsize,
    executions: AtomicUsize,
}

/// A minimal [`QueryEngine`] for tests.
///
/// Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    stats: Arc<EngineStats>,
}

impl MockEngine {
    /// Creates an engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of schemas successfully built.
    pub fn schemas_built(&self) -> usize {
        self.stats.schemas_built.load(Ordering::SeqCst)
    }

    /// Number of executed requests.
    pub fn executions(&self) -> usize {
        self.stats.executions.load(Ordering::SeqCst)
    }
}

impl QueryEngine for MockEngine {
    type Field = MockField;
    type Schema = MockSchema;

    fn build_schema(&self, config: SchemaConfig<MockField>) -> Result<MockSchema, SchemaError> {
        let Some(query) = config.query else {
            return Err(SchemaError::new(
                "Schema query must be Object Type but got: nil.",
            ));
        };

        for object in std::iter::once(&query).chain(config.mutation.as_ref()) {
            if let Some(bad) = object.fields.names().find(|name| !is_valid_name(name)) {
                return Err(SchemaError::new(format!(
                    "Names must match /^[_a-zA-Z][_a-zA-Z0-9]*$/ but \"{bad}\" does not."
                )));
            }
        }

        self.stats.schemas_built.fetch_add(1, Ordering::SeqCst);
        Ok(MockSchema {
            query,
            mutation: config.mutation,
        })
    }

    fn execute<'a>(
        &'a self,
        schema: &'a MockSchema,
        request: &'a GraphqlRequest,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, ExecutionResult> {
        Box::pin(async move {
            self.stats.executions.fetch_add(1, Ordering::SeqCst);

            let (kind, selected) = match parse_document(&request.query) {
                Ok(parsed) => parsed,
                Err(message) => return ExecutionResult::errors(vec![GatewayError::new(message)]),
            };

            let root = match kind {
                Operation::Query => &schema.query,
                Operation::Mutation => match &schema.mutation {
                    Some(mutation) => mutation,
                    None => {
                        return ExecutionResult::errors(vec![GatewayError::new(
                            "Schema is not configured for mutations.",
                        )])
                    }
                },
            };

            let unknown: Vec<GatewayError> = selected
                .iter()
                .filter(|name| !root.fields.contains(name))
                .map(|name| {
                    GatewayError::new(format!(
                        "Cannot query field \"{name}\" on type \"{}\".",
                        root.name
                    ))
                })
                .collect();
            if !unknown.is_empty() {
                return ExecutionResult::errors(unknown);
            }

            let mut data = Map::new();
            let mut errors = Vec::new();
            for name in selected {
                let Some(field) = root.fields.get(&name) else {
                    continue;
                };
                let value = match field.resolve(ctx, &request.variables) {
                    Ok(value) => value,
                    Err(message) => {
                        errors.push(GatewayError::new(message).with_path(vec![Value::String(name.clone())]));
                        Value::Null
                    }
                };
                data.insert(name, value);
            }

            ExecutionResult {
                data: Some(Value::Object(data)),
                errors,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Query,
    Mutation,
}

fn parse_document(document: &str) -> Result<(Operation, Vec<String>), String> {
    let document = document.trim();
    if document.is_empty() {
        return Err("Must provide an operation.".to_string());
    }

    let open = document
        .find('{')
        .ok_or_else(|| "Syntax Error: Expected {, found <EOF>".to_string())?;
    let close = document
        .rfind('}')
        .filter(|close| *close > open)
        .ok_or_else(|| "Syntax Error: Expected Name, found <EOF>".to_string())?;

    let kind = match document[..open].split_whitespace().next() {
        None | Some("query") => Operation::Query,
        Some("mutation") => Operation::Mutation,
        Some(other) => return Err(format!("Syntax Error: Unexpected Name \"{other}\"")),
    };

    let selected: Vec<String> = document[open + 1..close]
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    if selected.is_empty() {
        return Err("Syntax Error: Expected Name, found }".to_string());
    }
    if let Some(bad) = selected.iter().find(|name| !is_valid_name(name)) {
        return Err(format!("Syntax Error: Unexpected \"{bad}\""));
    }
    Ok((kind, selected))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Connection opened by [`StaticHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticConnection {
    /// Owning handler.
    pub handler: String,
    /// Sequence number, starting at 1 per handler.
    pub id: usize,
}

/// Connection lifecycle counters shared between a [`StaticHandler`] and a test.
#[derive(Debug, Default)]
pub struct HandlerCounters {
    opened: AtomicUsize,
    released: AtomicUsize,
    validations: AtomicUsize,
}

impl HandlerCounters {
    /// Connections successfully opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Release actions run.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Field-set calls made without a connection.
    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

type FieldFactory = Arc<dyn Fn(Option<&StaticConnection>) -> MockField + Send + Sync>;

/// Configurable handler for tests.
#[derive(Clone)]
pub struct StaticHandler {
    name: String,
    query: Vec<(String, FieldFactory)>,
    mutation: Vec<(String, FieldFactory)>,
    connect_error: Option<String>,
    connect_delay: Option<Duration>,
    counters: Arc<HandlerCounters>,
}

impl StaticHandler {
    /// Creates a handler contributing no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: Vec::new(),
            mutation: Vec::new(),
            connect_error: None,
            connect_delay: None,
            counters: Arc::default(),
        }
    }

    /// Adds a fixed query field.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, field: MockField) -> Self {
        self.query.push((name.into(), Arc::new(move |_| field.clone())));
        self
    }

    /// Adds a fixed mutation field.
    #[must_use]
    pub fn mutation(mut self, name: impl Into<String>, field: MockField) -> Self {
        self.mutation.push((name.into(), Arc::new(move |_| field.clone())));
        self
    }

    /// Adds a query field computed from the live connection.
    #[must_use]
    pub fn query_with_connection<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StaticConnection) -> Value + Send + Sync + 'static,
    {
        self.query.push((name.into(), connection_field(f)));
        self
    }

    /// Adds a mutation field computed from the live connection.
    #[must_use]
    pub fn mutation_with_connection<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StaticConnection) -> Value + Send + Sync + 'static,
    {
        self.mutation.push((name.into(), connection_field(f)));
        self
    }

    /// Makes every connection attempt fail with `message`.
    #[must_use]
    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Delays every connection attempt.
    #[must_use]
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Shared lifecycle counters.
    pub fn counters(&self) -> Arc<HandlerCounters> {
        Arc::clone(&self.counters)
    }

    fn build(&self, fields: &[(String, FieldFactory)], conn: Option<&StaticConnection>) -> FieldSet<MockField> {
        if conn.is_none() {
            self.counters.validations.fetch_add(1, Ordering::SeqCst);
        }
        fields
            .iter()
            .map(|(name, factory)| (name.clone(), factory(conn)))
            .collect()
    }
}

fn connection_field<F>(f: F) -> FieldFactory
where
    F: Fn(&StaticConnection) -> Value + Send + Sync + 'static,
{
    Arc::new(move |conn| match conn {
        Some(conn) => MockField::value(f(conn)),
        None => MockField::failing("no backend connection"),
    })
}

impl fmt::Debug for StaticHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticHandler")
            .field("name", &self.name)
            .field("query", &self.query.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("mutation", &self.mutation.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl GraphqlHandler<MockField> for StaticHandler {
    type Connection = StaticConnection;

    fn name(&self) -> &str {
        &self.name
    }

    fn open_connection<'a>(
        &'a self,
        _ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<(StaticConnection, Release), ConnectError>> {
        Box::pin(async move {
            if let Some(delay) = self.connect_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.connect_error {
                return Err(ConnectError::new(message.clone()));
            }

            let id = self.counters.opened.fetch_add(1, Ordering::SeqCst) + 1;
            let counters = Arc::clone(&self.counters);
            let release = Release::new(move || {
                counters.released.fetch_add(1, Ordering::SeqCst);
            });
            Ok((
                StaticConnection {
                    handler: self.name.clone(),
                    id,
                },
                release,
            ))
        })
    }

    fn query_fields(&self, conn: Option<&StaticConnection>) -> FieldSet<MockField> {
        self.build(&self.query, conn)
    }

    fn mutation_fields(&self, conn: Option<&StaticConnection>) -> FieldSet<MockField> {
        self.build(&self.mutation, conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(engine: &MockEngine, query: FieldSet<MockField>, mutation: FieldSet<MockField>) -> MockSchema {
        engine
            .build_schema(SchemaConfig::from_field_sets(query, mutation))
            .unwrap()
    }

    #[test]
    fn test_build_requires_query_root() {
        let err = MockEngine::new()
            .build_schema(SchemaConfig::from_field_sets(
                FieldSet::new(),
                FieldSet::new().with("create", MockField::value(1)),
            ))
            .unwrap_err();
        assert_eq!(err.to_string(), "Schema query must be Object Type but got: nil.");
    }

    #[test]
    fn test_build_rejects_invalid_names() {
        let err = MockEngine::new()
            .build_schema(SchemaConfig::from_field_sets(
                FieldSet::new().with("bad-name", MockField::value(1)),
                FieldSet::new(),
            ))
            .unwrap_err();
        assert!(err.to_string().contains("\"bad-name\" does not"));
    }

    #[tokio::test]
    async fn test_execute_selects_fields() {
        let engine = MockEngine::new();
        let schema = schema(
            &engine,
            FieldSet::new()
                .with("ping", MockField::value("pong"))
                .with("echo", MockField::new(|_, vars| Ok(vars.get("v").cloned().unwrap_or(Value::Null)))),
            FieldSet::new(),
        );
        let mut variables = Map::new();
        variables.insert("v".to_string(), json!(3));
        let request = GraphqlRequest::new("query { ping, echo }").with_variables(variables);

        let result = engine.execute(&schema, &request, &RequestContext::new()).await;
        assert_eq!(result.data, Some(json!({ "ping": "pong", "echo": 3 })));
        assert!(result.errors.is_empty());
        assert_eq!(engine.executions(), 1);
    }

    #[tokio::test]
    async fn test_unknown_field_has_no_data() {
        let engine = MockEngine::new();
        let schema = schema(&engine, FieldSet::new().with("ping", MockField::value(1)), FieldSet::new());

        let result = engine
            .execute(&schema, &GraphqlRequest::new("{ nope }"), &RequestContext::new())
            .await;
        assert!(result.data.is_none());
        assert_eq!(result.errors[0].message, "Cannot query field \"nope\" on type \"Query\".");
    }

    #[tokio::test]
    async fn test_resolver_error_nulls_field() {
        let engine = MockEngine::new();
        let schema = schema(
            &engine,
            FieldSet::new()
                .with("ok", MockField::value(true))
                .with("broken", MockField::failing("backend unavailable")),
            FieldSet::new(),
        );

        let result = engine
            .execute(&schema, &GraphqlRequest::new("{ ok broken }"), &RequestContext::new())
            .await;
        assert_eq!(result.data, Some(json!({ "ok": true, "broken": null })));
        assert_eq!(result.errors[0].path, Some(vec![json!("broken")]));
    }

    #[tokio::test]
    async fn test_mutation_without_root() {
        let engine = MockEngine::new();
        let schema = schema(&engine, FieldSet::new().with("ping", MockField::value(1)), FieldSet::new());

        let result = engine
            .execute(&schema, &GraphqlRequest::new("mutation { create }"), &RequestContext::new())
            .await;
        assert!(result.data.is_none());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_parse_document_errors() {
        assert!(parse_document("").is_err());
        assert!(parse_document("{ }").is_err());
        assert!(parse_document("subscription { x }").is_err());
        assert!(parse_document("{ user { id } }").is_err());
        assert_eq!(
            parse_document(" mutation Create { create } ").unwrap(),
            (Operation::Mutation, vec!["create".to_string()])
        );
    }

    #[tokio::test]
    async fn test_static_handler_lifecycle() {
        let handler = StaticHandler::new("orders")
            .query_with_connection("conn", |c| json!(format!("{}#{}", c.handler, c.id)));
        let counters = handler.counters();

        let fields = GraphqlHandler::query_fields(&handler, None);
        assert_eq!(fields.len(), 1);
        assert_eq!(counters.validations(), 1);

        let (conn, release) = handler.open_connection(&RequestContext::new()).await.unwrap();
        assert_eq!(conn.id, 1);
        let fields = GraphqlHandler::query_fields(&handler, Some(&conn));
        let value = fields.get("conn").unwrap().resolve(&RequestContext::new(), &Map::new());
        assert_eq!(value, Ok(json!("orders#1")));

        release.run();
        assert_eq!(counters.opened(), 1);
        assert_eq!(counters.released(), 1);
    }

    #[tokio::test]
    async fn test_static_handler_connect_failure() {
        let handler = StaticHandler::new("down").fail_connect("connection refused");
        let err = handler.open_connection(&RequestContext::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(handler.counters().opened(), 0);
    }
}

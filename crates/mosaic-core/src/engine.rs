//! Query engine contract.
//!
//! The gateway never interprets queries itself. It hands the aggregated
//! [`SchemaConfig`] to a [`QueryEngine`] to obtain an executable schema,
//! then asks the engine to run the parsed request against it.

use crate::context::RequestContext;
use crate::error::{GatewayError, SchemaError};
use crate::request::GraphqlRequest;
use crate::schema::SchemaConfig;
use crate::types::BoxFuture;
use serde_json::Value;

/// Outcome of executing one request.
///
/// Engine errors may coexist with partial `data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    /// Result data, if execution started.
    pub data: Option<Value>,
    /// Errors reported by the engine.
    pub errors: Vec<GatewayError>,
}

impl ExecutionResult {
    /// A successful result.
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// A result carrying only errors.
    pub fn errors(errors: Vec<GatewayError>) -> Self {
        Self { data: None, errors }
    }

    /// Returns `true` if the engine reported any error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Builds schemas and executes requests against them.
pub trait QueryEngine: Send + Sync + 'static {
    /// Field definition type contributed by handlers.
    type Field: Send + Sync + 'static;

    /// Executable schema.
    type Schema: Send + Sync + 'static;

    /// Validates a schema description and builds an executable schema.
    fn build_schema(&self, config: SchemaConfig<Self::Field>) -> Result<Self::Schema, SchemaError>;

    /// Executes a request.
    fn execute<'a>(
        &'a self,
        schema: &'a Self::Schema,
        request: &'a GraphqlRequest,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, ExecutionResult>;
}

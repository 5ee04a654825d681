//! Per-request schema aggregation.
//!
//! For every request each registered handler opens one connection, in
//! registration order, and contributes query and mutation fields given
//! that connection. Fields are merged last-write-wins and a single schema
//! is built from the result. Opened connections go into the caller's
//! [`ReleaseGuard`], on success and on failure alike, so the caller decides
//! when they are released.

use mosaic_core::{
    ConnectError, ErrorCode, FieldSet, GatewayError, QueryEngine, ReleaseGuard, RequestContext,
    SchemaConfig, SchemaError,
};
use mosaic_telemetry::{record_connection_failure, record_schema_fields, RequestOutcome};
use thiserror::Error;

use crate::registry::HandlerRegistry;

/// Why aggregation stopped.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// A handler could not open its connection.
    #[error("Failed to create connection: {source}")]
    Connect {
        /// Handler that failed.
        handler: String,
        /// Cause reported by the handler.
        source: ConnectError,
    },

    /// The engine rejected the merged schema.
    #[error("Failed to build schema: {0}")]
    Schema(#[from] SchemaError),
}

impl AggregateError {
    /// Wire error for this failure.
    #[must_use]
    pub fn to_gateway_error(&self) -> GatewayError {
        let code = match self {
            Self::Connect { .. } => ErrorCode::Connection,
            Self::Schema(_) => ErrorCode::SchemaGeneration,
        };
        GatewayError::from_code(code, self.to_string())
    }

    /// Metrics classification.
    #[must_use]
    pub fn outcome(&self) -> RequestOutcome {
        match self {
            Self::Connect { .. } => RequestOutcome::ConnectionError,
            Self::Schema(_) => RequestOutcome::SchemaError,
        }
    }
}

impl From<AggregateError> for GatewayError {
    fn from(err: AggregateError) -> Self {
        err.to_gateway_error()
    }
}

/// Opens every handler's connection and builds this request's schema.
///
/// Every connection opened is pushed into `guard` before the next handler
/// is asked, so it still holds them when this returns an error or the
/// future is dropped.
///
/// # Errors
///
/// Returns [`AggregateError::Connect`] on the first connection failure and
/// [`AggregateError::Schema`] if the merged schema is invalid.
pub async fn aggregate<E: QueryEngine>(
    engine: &E,
    registry: &HandlerRegistry<E::Field>,
    ctx: &RequestContext,
    guard: &mut ReleaseGuard,
) -> Result<E::Schema, AggregateError> {
    let mut query = FieldSet::new();
    let mut mutation = FieldSet::new();

    for handler in registry.iter() {
        let (conn, release) = match handler.open(ctx).await {
            Ok(opened) => opened,
            Err(source) => {
                tracing::warn!(
                    handler = handler.name(),
                    request_id = %ctx.request_id(),
                    error = %source,
                    opened = guard.len(),
                    "failed to open backend connection"
                );
                record_connection_failure(handler.name());
                return Err(AggregateError::Connect {
                    handler: handler.name().to_string(),
                    source,
                });
            }
        };

        query.merge(handler.query_fields(Some(&conn)));
        mutation.merge(handler.mutation_fields(Some(&conn)));
        guard.push(conn, release);
    }

    record_schema_fields(query.len(), mutation.len());
    tracing::debug!(
        request_id = %ctx.request_id(),
        connections = guard.len(),
        queries = query.len(),
        mutations = mutation.len(),
        "aggregated fields"
    );

    engine
        .build_schema(SchemaConfig::from_field_sets(query, mutation))
        .map_err(|e| {
            tracing::warn!(request_id = %ctx.request_id(), error = %e, "failed to build schema");
            AggregateError::Schema(e)
        })
}

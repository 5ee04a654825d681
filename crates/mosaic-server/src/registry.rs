//! Handler registry.
//!
//! Handlers are validated once, when they are registered, by building a
//! schema from the fields they contribute without a connection.

use mosaic_core::{DynHandler, GraphqlHandler, QueryEngine, SchemaConfig};
use std::fmt;

use crate::error::RegistryError;

/// Append-only list of handlers in registration order.
pub struct HandlerRegistry<F> {
    handlers: Vec<Box<dyn DynHandler<F>>>,
}

impl<F: Send + Sync + 'static> HandlerRegistry<F> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Validates `handler` against `engine` and appends it.
    ///
    /// A handler that contributes no fields is accepted without
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SchemaValidation`] if the engine rejects a
    /// schema built from the handler's fields alone.
    pub fn register<E, H>(&mut self, handler: H, engine: &E) -> Result<(), RegistryError>
    where
        E: QueryEngine<Field = F>,
        H: GraphqlHandler<F>,
    {
        let query = GraphqlHandler::query_fields(&handler, None);
        let mutation = GraphqlHandler::mutation_fields(&handler, None);

        if query.is_empty() && mutation.is_empty() {
            tracing::debug!(handler = handler.name(), "registered handler without fields");
        } else {
            let (queries, mutations) = (query.len(), mutation.len());
            engine
                .build_schema(SchemaConfig::from_field_sets(query, mutation))
                .map_err(|e| RegistryError::SchemaValidation(e.to_string()))?;
            tracing::debug!(
                handler = handler.name(),
                queries,
                mutations,
                "registered handler"
            );
        }

        self.handlers.push(Box::new(handler));
        Ok(())
    }

    /// Handlers in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Box<dyn DynHandler<F>>> {
        self.handlers.iter()
    }

    /// Handler names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.handlers.iter().map(|h| h.name())
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<F: Send + Sync + 'static> Default for HandlerRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Send + Sync + 'static> fmt::Debug for HandlerRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

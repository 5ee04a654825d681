//! Server error types.

use thiserror::Error;

/// Returned when a handler is rejected at registration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The handler's fields do not form a valid schema on their own.
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),
}

/// Errors that stop the server from running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured address.
    #[error("Bind error: {0}")]
    Bind(String),

    /// I/O error on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

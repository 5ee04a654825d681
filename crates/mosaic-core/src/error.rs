//! Error types for Mosaic.
//!
//! Every failure that reaches a client is expressed as a [`GatewayError`]:
//! a message plus an `extensions` object carrying at least a `code`. Engine
//! errors may additionally carry `locations` and `path`, which are passed
//! through unchanged.
//!
//! Collaborator failures have their own typed errors ([`ConnectError`],
//! [`SchemaError`]) which the gateway maps onto an [`ErrorCode`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Machine-readable failure classes produced by the gateway itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A middleware rejected the request.
    Middleware,
    /// A handler failed to open its backend connection.
    Connection,
    /// The aggregated schema could not be built.
    SchemaGeneration,
    /// The request could not be parsed into a query.
    RequestParse,
    /// The request deadline elapsed.
    RequestTimeout,
}

impl ErrorCode {
    /// Returns the wire representation of this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Middleware => "MIDDLEWARE_ERROR",
            Self::Connection => "CONNECTION_ERROR",
            Self::SchemaGeneration => "SCHEMA_GENERATION_ERROR",
            Self::RequestParse => "REQUEST_PARSE_ERROR",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position in the query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// A single entry in the `errors` list of a response.
///
/// # Example
///
/// ```
/// use mosaic_core::{ErrorCode, GatewayError};
///
/// let err = GatewayError::from_code(ErrorCode::RequestParse, "Failed to parse request: bad json");
/// assert_eq!(err.code(), Some("REQUEST_PARSE_ERROR"));
///
/// let json = serde_json::to_value(&err).unwrap();
/// assert_eq!(json["extensions"]["code"], "REQUEST_PARSE_ERROR");
/// assert!(json.get("path").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayError {
    /// Human-readable message.
    pub message: String,
    /// Positions in the query document, for engine errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    /// Response path, for engine errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    /// Structured extensions; gateway errors always carry `code`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl GatewayError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: Map::new(),
        }
    }

    /// Creates an error tagged with an arbitrary code.
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(message).with_code(code)
    }

    /// Creates an error tagged with one of the gateway's own codes.
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::coded(code.as_str(), message)
    }

    /// Sets `extensions.code`.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.extensions
            .insert("code".to_string(), Value::String(code.into()));
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<Value>) -> Self {
        self.path = Some(path);
        self
    }

    /// Sets the document locations.
    #[must_use]
    pub fn with_locations(mut self, locations: Vec<Location>) -> Self {
        self.locations = Some(locations);
        self
    }

    /// Adds an arbitrary extension entry.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Returns `extensions.code` if it is a string.
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(Value::as_str)
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for GatewayError {}

/// A handler failed to open its backend connection.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectError {
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

impl ConnectError {
    /// Creates a connection error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a connection error wrapping an underlying cause.
    pub fn with_source(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the message without the source chain.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The query engine rejected a schema description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SchemaError(pub String);

impl SchemaError {
    /// Creates a schema error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

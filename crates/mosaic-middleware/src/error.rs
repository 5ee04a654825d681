//! Middleware failure type.

use mosaic_core::{ErrorCode, GatewayError};
use thiserror::Error;

/// Error returned by a middleware to stop the request.
///
/// A [`MiddlewareError::Coded`] error reaches the client with its own code
/// and message. Any other variant is reported under `MIDDLEWARE_ERROR`
/// with its display text as the message.
///
/// # Example
///
/// ```
/// use mosaic_middleware::MiddlewareError;
///
/// let err = MiddlewareError::coded("UNAUTHENTICATED", "missing token");
/// let gateway = err.to_gateway_error();
/// assert_eq!(gateway.code(), Some("UNAUTHENTICATED"));
/// assert_eq!(gateway.message, "missing token");
///
/// let err = MiddlewareError::rejected("tenant header required");
/// assert_eq!(err.to_gateway_error().code(), Some("MIDDLEWARE_ERROR"));
/// ```
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// A failure with an explicit client-facing code.
    #[error("{message}")]
    Coded {
        /// Error code placed in `extensions.code`.
        code: String,
        /// Client-facing message.
        message: String,
    },

    /// The request was rejected.
    #[error("{0}")]
    Rejected(String),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MiddlewareError {
    /// Creates a coded error.
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Coded {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an uncoded rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Returns the client-facing code.
    pub fn code(&self) -> &str {
        match self {
            Self::Coded { code, .. } => code,
            _ => ErrorCode::Middleware.as_str(),
        }
    }

    /// Converts to the wire error shape.
    pub fn to_gateway_error(&self) -> GatewayError {
        match self {
            Self::Coded { code, message } => GatewayError::coded(code.clone(), message.clone()),
            other => GatewayError::from_code(ErrorCode::Middleware, other.to_string()),
        }
    }
}

impl From<MiddlewareError> for GatewayError {
    fn from(err: MiddlewareError) -> Self {
        err.to_gateway_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_is_wrapped() {
        let err = MiddlewareError::from(anyhow::anyhow!("quota lookup failed"));
        assert_eq!(err.code(), "MIDDLEWARE_ERROR");

        let gateway = GatewayError::from(err);
        assert_eq!(gateway.message, "quota lookup failed");
        assert_eq!(gateway.code(), Some("MIDDLEWARE_ERROR"));
    }

    #[test]
    fn test_coded_is_preserved() {
        let err = MiddlewareError::coded("RATE_LIMITED", "slow down");
        assert_eq!(err.code(), "RATE_LIMITED");
        assert_eq!(err.to_string(), "slow down");
    }
}

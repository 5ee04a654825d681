//! Response envelope.

use crate::engine::ExecutionResult;
use crate::error::GatewayError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{ data?, errors? }` envelope written for every request.
///
/// # Example
///
/// ```
/// use mosaic_core::{ErrorCode, GatewayError, GraphqlResponse};
///
/// let response = GraphqlResponse::error(GatewayError::from_code(ErrorCode::Connection, "down"));
/// let json: serde_json::Value = serde_json::from_slice(&response.to_bytes()).unwrap();
/// assert!(json.get("data").is_none());
/// assert_eq!(json["errors"][0]["extensions"]["code"], "CONNECTION_ERROR");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    /// Result data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Errors, omitted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GatewayError>,
}

impl GraphqlResponse {
    /// A response carrying a single fatal error and no data.
    pub fn error(error: GatewayError) -> Self {
        Self {
            data: None,
            errors: vec![error],
        }
    }

    /// Serializes the envelope.
    ///
    /// Falls back to a fixed error envelope if serialization fails.
    pub fn to_bytes(&self) -> Bytes {
        match serde_json::to_vec(self) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                Bytes::from_static(br#"{"errors":[{"message":"Failed to serialize response"}]}"#)
            }
        }
    }
}

impl From<ExecutionResult> for GraphqlResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            data: result.data,
            errors: result.errors,
        }
    }
}

//! Request parsing.
//!
//! A query arrives either as a JSON body on `POST` or as URL parameters on
//! `GET`:
//!
//! | Source | `query` | `variables` | `operationName` |
//! |--------|---------|-------------|-----------------|
//! | `POST` body | string | object | string |
//! | `GET` params | `query` | JSON text | `operationName` |

use bytes::Bytes;
use http::{Method, Uri};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A parsed query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    /// Query document.
    #[serde(default)]
    pub query: String,
    /// Variable values; `null` or absent becomes empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub variables: Map<String, Value>,
    /// Operation to run when the document holds several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl GraphqlRequest {
    /// Creates a request for a query document.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Sets the variables.
    #[must_use]
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reasons a request could not be turned into a [`GraphqlRequest`].
#[derive(Debug, Error)]
pub enum RequestParseError {
    /// Only `GET` and `POST` carry queries.
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    /// The `POST` body is not a valid request object.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The URL query string could not be decoded.
    #[error("invalid query string: {0}")]
    InvalidQueryString(#[from] serde_urlencoded::de::Error),

    /// The `variables` URL parameter is not a JSON object.
    #[error("invalid variables: {0}")]
    InvalidVariables(String),

    /// The body could not be read.
    #[error("failed to read body: {0}")]
    Body(String),

    /// The body is larger than the configured limit, in bytes.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    #[serde(default)]
    query: String,
    variables: Option<String>,
    operation_name: Option<String>,
}

/// Parses a request from its method, URI and collected body.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use http::{Method, Uri};
/// use mosaic_core::parse_request;
///
/// let uri: Uri = "/graphql?query=%7Bping%7D".parse().unwrap();
/// let request = parse_request(&Method::GET, &uri, &Bytes::new()).unwrap();
/// assert_eq!(request.query, "{ping}");
/// ```
pub fn parse_request(
    method: &Method,
    uri: &Uri,
    body: &Bytes,
) -> Result<GraphqlRequest, RequestParseError> {
    match *method {
        Method::POST => Ok(serde_json::from_slice(body)?),
        Method::GET => parse_query_params(uri.query().unwrap_or_default()),
        _ => Err(RequestParseError::UnsupportedMethod(method.clone())),
    }
}

fn parse_query_params(query: &str) -> Result<GraphqlRequest, RequestParseError> {
    let params: QueryParams = serde_urlencoded::from_str(query)?;

    let variables = match params.variables.as_deref().map(str::trim) {
        None | Some("" | "null") => Map::new(),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(RequestParseError::InvalidVariables(format!(
                    "expected an object, got {other}"
                )))
            }
            Err(e) => return Err(RequestParseError::InvalidVariables(e.to_string())),
        },
    };

    Ok(GraphqlRequest {
        query: params.query,
        variables,
        operation_name: params.operation_name.filter(|name| !name.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_post_body() {
        let body = Bytes::from_static(
            br#"{"query":"query Q($id: ID) { user(id: $id) }","variables":{"id":"1"},"operationName":"Q"}"#,
        );
        let request = parse_request(&Method::POST, &uri("/graphql"), &body).unwrap();
        assert_eq!(request.query, "query Q($id: ID) { user(id: $id) }");
        assert_eq!(request.variables.get("id"), Some(&json!("1")));
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
    }

    #[test]
    fn test_post_null_variables() {
        let body = Bytes::from_static(br#"{"query":"{ping}","variables":null}"#);
        let request = parse_request(&Method::POST, &uri("/graphql"), &body).unwrap();
        assert!(request.variables.is_empty());
        assert!(request.operation_name.is_none());
    }

    #[test]
    fn test_post_malformed_body() {
        let body = Bytes::from_static(b"{not json");
        let err = parse_request(&Method::POST, &uri("/graphql"), &body).unwrap_err();
        assert!(matches!(err, RequestParseError::InvalidJson(_)));
    }

    #[test]
    fn test_get_params() {
        let target = "/graphql?query=%7Buser%7D&variables=%7B%22id%22%3A2%7D&operationName=Op";
        let request = parse_request(&Method::GET, &uri(target), &Bytes::new()).unwrap();
        assert_eq!(request.query, "{user}");
        assert_eq!(request.variables.get("id"), Some(&json!(2)));
        assert_eq!(request.operation_name.as_deref(), Some("Op"));
    }

    #[test]
    fn test_get_without_query_string() {
        let request = parse_request(&Method::GET, &uri("/graphql"), &Bytes::new()).unwrap();
        assert_eq!(request, GraphqlRequest::default());
    }

    #[test]
    fn test_get_variables_must_be_object() {
        let err = parse_request(&Method::GET, &uri("/graphql?variables=%5B1%5D"), &Bytes::new())
            .unwrap_err();
        assert!(matches!(err, RequestParseError::InvalidVariables(_)));
    }

    #[test]
    fn test_other_methods_rejected() {
        let err = parse_request(&Method::PUT, &uri("/graphql"), &Bytes::new()).unwrap_err();
        assert_eq!(err.to_string(), "unsupported method PUT");
    }
}

//! HTTP response writing.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use mosaic_core::{GatewayError, GraphqlResponse};

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

const APPLICATION_JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

/// Writes a gateway envelope.
///
/// Always `200 OK`, `Content-Type: application/json` and an exact
/// `Content-Length`. `headers` (CORS, response metadata) are kept.
#[must_use]
pub fn write_response(response: &GraphqlResponse, headers: HeaderMap) -> HttpResponse {
    body_response(StatusCode::OK, APPLICATION_JSON, response.to_bytes(), headers)
}

/// Writes a JSON value with the given status.
pub(crate) fn json_response(status: StatusCode, body: &impl serde::Serialize) -> HttpResponse {
    let body = match serde_json::to_vec(body) {
        Ok(body) => Bytes::from(body),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            Bytes::from_static(b"{}")
        }
    };
    body_response(status, APPLICATION_JSON, body, HeaderMap::new())
}

/// Writes Prometheus exposition text.
pub(crate) fn metrics_response(text: String) -> HttpResponse {
    body_response(StatusCode::OK, PROMETHEUS_TEXT, Bytes::from(text), HeaderMap::new())
}

/// 404 envelope for paths the server does not route.
pub(crate) fn not_found(path: &str) -> HttpResponse {
    let envelope = GraphqlResponse::error(GatewayError::new(format!("No route for {path}")));
    body_response(
        StatusCode::NOT_FOUND,
        APPLICATION_JSON,
        envelope.to_bytes(),
        HeaderMap::new(),
    )
}

fn body_response(
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
    headers: HeaderMap,
) -> HttpResponse {
    let length = body.len();
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use mosaic_core::ErrorCode;

    async fn body_of(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_write_response_headers() {
        let mut extra = HeaderMap::new();
        extra.insert("access-control-allow-credentials", HeaderValue::from_static("true"));

        let envelope = GraphqlResponse::error(GatewayError::from_code(ErrorCode::RequestParse, "bad"));
        let response = write_response(&envelope, extra);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");

        let length: usize = response.headers()[CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
        let body = body_of(response).await;
        assert_eq!(body.len(), length);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errors"][0]["extensions"]["code"], "REQUEST_PARSE_ERROR");
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = not_found("/nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert_eq!(json["errors"][0]["message"], "No route for /nope");
    }
}

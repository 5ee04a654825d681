//! Gateway behavior through `ServeMux::serve`.
//!
//! Each test builds a mux from the mock engine and static handlers, sends
//! one or more in-memory requests and checks the envelope, headers and
//! connection lifecycle counters.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use mosaic_core::fixtures::{MockEngine, MockField, StaticHandler};
use mosaic_core::{Metadata, Request, RequestContext, RequestParseError};
use mosaic_middleware::stages::{CorsMiddleware, MetadataMiddleware, RequestIdMiddleware};
use mosaic_middleware::{FnMiddleware, MiddlewareContext, MiddlewareError};
use mosaic_server::{HttpResponse, ServeMux};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn post(uri: &str, body: Value) -> Request {
    http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Bytes::from(body.to_string()))
        .unwrap()
}

fn query(document: &str) -> Request {
    post("/graphql", json!({ "query": document }))
}

async fn split(response: HttpResponse) -> (StatusCode, HeaderMap, Value) {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, serde_json::from_slice(&bytes).unwrap())
}

fn single_error_code(json: &Value) -> &str {
    let errors = json["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1, "expected exactly one error: {json}");
    errors[0]["extensions"]["code"].as_str().expect("error code")
}

#[tokio::test]
async fn test_later_handler_wins_and_mutation_uses_its_connection() {
    let a = StaticHandler::new("a").query("ping", MockField::value("from a"));
    let b = StaticHandler::new("b")
        .query("ping", MockField::value("from b"))
        .mutation_with_connection("create", |conn| json!({ "handler": conn.handler, "id": conn.id }));
    let (a_counters, b_counters) = (a.counters(), b.counters());

    let mux = ServeMux::builder(MockEngine::new())
        .handler(a)
        .unwrap()
        .handler(b)
        .unwrap()
        .build();

    let (status, _, json) = split(mux.serve(query("{ ping }")).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "data": { "ping": "from b" } }));

    let (_, _, json) = split(mux.serve(query("mutation { create }")).await).await;
    assert_eq!(json, json!({ "data": { "create": { "handler": "b", "id": 2 } } }));

    assert_eq!(a_counters.opened(), 2);
    assert_eq!(a_counters.released(), 2);
    assert_eq!(b_counters.opened(), 2);
    assert_eq!(b_counters.released(), 2);
}

#[tokio::test]
async fn test_connection_failure_releases_earlier_connections() {
    let first = StaticHandler::new("first").query("a", MockField::value(1));
    let broken = StaticHandler::new("broken")
        .query("b", MockField::value(2))
        .fail_connect("dial tcp: connection refused");
    let last = StaticHandler::new("last").query("c", MockField::value(3));
    let (first_counters, last_counters) = (first.counters(), last.counters());

    let engine = MockEngine::new();
    let mux = ServeMux::builder(engine.clone())
        .handler(first)
        .unwrap()
        .handler(broken)
        .unwrap()
        .handler(last)
        .unwrap()
        .build();

    let (status, _, json) = split(mux.serve(query("{ a }")).await).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.get("data").is_none());
    assert_eq!(single_error_code(&json), "CONNECTION_ERROR");
    assert_eq!(
        json["errors"][0]["message"],
        "Failed to create connection: dial tcp: connection refused"
    );

    assert_eq!(first_counters.opened(), 1);
    assert_eq!(first_counters.released(), 1);
    assert_eq!(last_counters.opened(), 0);
    assert_eq!(engine.executions(), 0);
}

#[tokio::test]
async fn test_releases_run_once_when_execution_fails() {
    let handler = StaticHandler::new("a")
        .query("ok", MockField::value(true))
        .query("broken", MockField::failing("resolver exploded"));
    let counters = handler.counters();
    let mux = ServeMux::builder(MockEngine::new()).handler(handler).unwrap().build();

    let (_, _, json) = split(mux.serve(query("{ ok broken }")).await).await;
    assert_eq!(json["data"], json!({ "ok": true, "broken": null }));
    assert_eq!(json["errors"][0]["message"], "resolver exploded");
    assert_eq!(json["errors"][0]["path"], json!(["broken"]));

    let (_, _, json) = split(mux.serve(query("{ unknown }")).await).await;
    assert!(json.get("data").is_none());

    assert_eq!(counters.opened(), 2);
    assert_eq!(counters.released(), 2);
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let handler = StaticHandler::new("a").query("ping", MockField::value("pong"));
    let counters = handler.counters();
    let mux = ServeMux::builder(MockEngine::new()).handler(handler).unwrap().build();

    let request = http::Request::builder()
        .method("POST")
        .uri("/graphql")
        .body(Bytes::from_static(b"{not json"))
        .unwrap();
    let (status, headers, json) = split(mux.serve(request).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/json");
    assert!(json.get("data").is_none());
    assert_eq!(single_error_code(&json), "REQUEST_PARSE_ERROR");
    assert!(json["errors"][0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to parse request: "));

    assert_eq!(counters.opened(), 1);
    assert_eq!(counters.released(), 1);
}

#[tokio::test]
async fn test_unsupported_method_is_a_parse_error() {
    let mux = ServeMux::builder(MockEngine::new())
        .handler(StaticHandler::new("a").query("ping", MockField::value("pong")))
        .unwrap()
        .build();

    let request = http::Request::builder()
        .method("PUT")
        .uri("/graphql")
        .body(Bytes::new())
        .unwrap();
    let (_, _, json) = split(mux.serve(request).await).await;

    assert_eq!(single_error_code(&json), "REQUEST_PARSE_ERROR");
    assert_eq!(
        json["errors"][0]["message"],
        "Failed to parse request: unsupported method PUT"
    );
}

#[tokio::test]
async fn test_get_request_with_variables() {
    let mux = ServeMux::builder(MockEngine::new())
        .handler(StaticHandler::new("a").query(
            "echo",
            MockField::new(|_, variables| Ok(variables.get("name").cloned().unwrap_or(Value::Null))),
        ))
        .unwrap()
        .build();

    let request = http::Request::builder()
        .method("GET")
        .uri("/graphql?query=%7B%20echo%20%7D&variables=%7B%22name%22%3A%22mosaic%22%7D")
        .body(Bytes::new())
        .unwrap();
    let (_, _, json) = split(mux.serve(request).await).await;

    assert_eq!(json, json!({ "data": { "echo": "mosaic" } }));
}

#[tokio::test]
async fn test_cors_headers() {
    let mux = ServeMux::builder(MockEngine::new())
        .middleware(CorsMiddleware::new())
        .handler(StaticHandler::new("a").query("ping", MockField::value("pong")))
        .unwrap()
        .build();

    let request = post("http://example.com/graphql", json!({ "query": "{ ping }" }));
    let (_, headers, json) = split(mux.serve(request).await).await;

    assert_eq!(headers["access-control-allow-origin"], "example.com");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
    assert_eq!(headers["access-control-max-age"], "1728000");
    assert_eq!(json["data"]["ping"], "pong");
}

#[tokio::test]
async fn test_unreadable_body_still_runs_middleware() {
    let handler = StaticHandler::new("a").query("ping", MockField::value("pong"));
    let counters = handler.counters();
    let mux = ServeMux::builder(MockEngine::new())
        .middleware(RequestIdMiddleware::new())
        .middleware(CorsMiddleware::new())
        .handler(handler)
        .unwrap()
        .build();

    let request = post("http://example.com/graphql", Value::Null);
    let error = RequestParseError::Body("timed out".to_string());
    let (status, headers, json) = split(mux.serve_with_body_error(request, error).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "example.com");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(single_error_code(&json), "REQUEST_PARSE_ERROR");
    assert_eq!(
        json["errors"][0]["message"],
        "Failed to parse request: failed to read body: timed out"
    );
    assert_eq!(counters.opened(), 0);
}

#[tokio::test]
async fn test_middleware_failure_stops_before_connections() {
    let third_calls = Arc::new(AtomicUsize::new(0));
    let handler = StaticHandler::new("a").query("ping", MockField::value("pong"));
    let counters = handler.counters();

    let third = {
        let calls = Arc::clone(&third_calls);
        FnMiddleware::new("third", move |_: &mut MiddlewareContext, _: &Request, _: &mut HeaderMap| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    let mux = ServeMux::builder(MockEngine::new())
        .middleware(CorsMiddleware::new())
        .middleware(FnMiddleware::new(
            "auth",
            |_: &mut MiddlewareContext, _: &Request, _: &mut HeaderMap| {
                Err(MiddlewareError::coded("UNAUTHENTICATED", "missing token"))
            },
        ))
        .middleware(third)
        .handler(handler)
        .unwrap()
        .build();

    let (status, headers, json) = split(mux.serve(post("http://example.com/graphql", json!({ "query": "{ ping }" }))).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(single_error_code(&json), "UNAUTHENTICATED");
    assert_eq!(json["errors"][0]["message"], "missing token");
    assert!(json.get("data").is_none());
    assert_eq!(headers["access-control-allow-origin"], "example.com");

    assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    assert_eq!(counters.opened(), 0);
}

#[tokio::test]
async fn test_plain_middleware_error_uses_default_code() {
    let mux = ServeMux::builder(MockEngine::new())
        .middleware(FnMiddleware::new(
            "maintenance",
            |_: &mut MiddlewareContext, _: &Request, _: &mut HeaderMap| {
                Err(MiddlewareError::rejected("down for maintenance"))
            },
        ))
        .build();

    let (_, _, json) = split(mux.serve(query("{ ping }")).await).await;
    assert_eq!(single_error_code(&json), "MIDDLEWARE_ERROR");
    assert_eq!(json["errors"][0]["message"], "down for maintenance");
}

#[tokio::test]
async fn test_request_timeout_releases_opened_connections() {
    let fast = StaticHandler::new("fast").query("a", MockField::value(1));
    let slow = StaticHandler::new("slow")
        .query("b", MockField::value(2))
        .connect_delay(Duration::from_millis(500));
    let (fast_counters, slow_counters) = (fast.counters(), slow.counters());

    let mux = ServeMux::builder(MockEngine::new())
        .request_timeout(Duration::from_millis(30))
        .handler(fast)
        .unwrap()
        .handler(slow)
        .unwrap()
        .build();

    let (status, _, json) = split(mux.serve(query("{ a }")).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(single_error_code(&json), "REQUEST_TIMEOUT");
    assert!(json.get("data").is_none());
    assert_eq!(fast_counters.opened(), 1);
    assert_eq!(fast_counters.released(), 1);
    assert_eq!(slow_counters.opened(), 0);
}

#[tokio::test]
async fn test_response_metadata_becomes_headers() {
    let mux = ServeMux::builder(MockEngine::new())
        .handler(StaticHandler::new("a").query(
            "traced",
            MockField::new(|ctx, _| {
                ctx.response_metadata().insert("x-trace-id", "abc123");
                Ok(Value::Bool(true))
            }),
        ))
        .unwrap()
        .build();

    let (_, headers, json) = split(mux.serve(query("{ traced }")).await).await;

    assert_eq!(json["data"]["traced"], true);
    assert_eq!(headers["grpc-metadata-x-trace-id"], "abc123");
}

#[tokio::test]
async fn test_custom_outgoing_matcher() {
    let mux = ServeMux::builder(MockEngine::new())
        .outgoing_header_matcher(|key| (key == "x-public").then(|| "X-Backend-Public".to_string()))
        .handler(StaticHandler::new("a").query(
            "traced",
            MockField::new(|ctx, _| {
                ctx.response_metadata().insert("x-public", "yes");
                ctx.response_metadata().insert("x-private", "no");
                Ok(Value::Null)
            }),
        ))
        .unwrap()
        .build();

    let (_, headers, _) = split(mux.serve(query("{ traced }")).await).await;

    assert_eq!(headers["x-backend-public"], "yes");
    assert!(headers.keys().all(|name| !name.as_str().contains("private")));
}

#[tokio::test]
async fn test_request_scoped_annotators_and_request_id() {
    let mux = ServeMux::builder(MockEngine::new())
        .middleware(RequestIdMiddleware::trust_incoming())
        .middleware(MetadataMiddleware::new(|_: &RequestContext, req: &Request| {
            Metadata::pairs([("x-path", req.uri().path())])
        }))
        .incoming_header_matcher(|key| {
            key.eq_ignore_ascii_case("authorization").then(|| "auth".to_string())
        })
        .handler(StaticHandler::new("a").query(
            "whoami",
            MockField::new(|ctx, _| {
                Ok(json!({
                    "path": ctx.metadata().get("x-path"),
                    "auth": ctx.metadata().get("auth"),
                    "request_id": ctx.request_id().to_string(),
                }))
            }),
        ))
        .unwrap()
        .build();

    let mut request = query("{ whoami }");
    let headers = request.headers_mut();
    headers.insert("authorization", HeaderValue::from_static("Bearer t0ken"));
    headers.insert(
        "x-request-id",
        HeaderValue::from_static("01890a5d-ac96-774b-bcce-b302099a8057"),
    );

    let (_, headers, json) = split(mux.serve(request).await).await;

    assert_eq!(
        json["data"]["whoami"],
        json!({
            "path": "/graphql",
            "auth": "Bearer t0ken",
            "request_id": "01890a5d-ac96-774b-bcce-b302099a8057",
        })
    );
    assert_eq!(headers["x-request-id"], "01890a5d-ac96-774b-bcce-b302099a8057");
}

#[tokio::test]
async fn test_zero_field_handler_still_connects() {
    let side_effects = StaticHandler::new("audit");
    let audit = side_effects.counters();
    let mux = ServeMux::builder(MockEngine::new())
        .handler(side_effects)
        .unwrap()
        .handler(StaticHandler::new("a").query("ping", MockField::value("pong")))
        .unwrap()
        .build();

    let (_, _, json) = split(mux.serve(query("{ ping }")).await).await;

    assert_eq!(json["data"]["ping"], "pong");
    assert_eq!(audit.opened(), 1);
    assert_eq!(audit.released(), 1);
}

#[tokio::test]
async fn test_no_query_fields_is_a_schema_error() {
    let mux = ServeMux::builder(MockEngine::new())
        .handler(StaticHandler::new("audit"))
        .unwrap()
        .build();

    let (_, _, json) = split(mux.serve(query("{ ping }")).await).await;

    assert_eq!(single_error_code(&json), "SCHEMA_GENERATION_ERROR");
    assert_eq!(
        json["errors"][0]["message"],
        "Failed to build schema: Schema query must be Object Type but got: nil."
    );
}

#[test]
fn test_registration_rejects_invalid_handler() {
    let err = ServeMux::builder(MockEngine::new())
        .handler(StaticHandler::new("bad").query("not valid", MockField::value(1)))
        .unwrap_err();

    assert!(err.to_string().starts_with("Schema validation error: "));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_every_opened_connection_is_released(
        handler_count in 1usize..6,
        failing in proptest::option::of(0usize..6),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let mut builder = ServeMux::builder(MockEngine::new());
        let mut counters = Vec::new();
        for i in 0..handler_count {
            let mut handler = StaticHandler::new(format!("h{i}")).query(format!("f{i}"), MockField::value(i));
            if failing == Some(i) {
                handler = handler.fail_connect("unavailable");
            }
            counters.push(handler.counters());
            builder = builder.handler(handler).unwrap();
        }
        let mux = builder.build();

        let (_, _, json) = runtime.block_on(async { split(mux.serve(query("{ f0 }")).await).await });

        for c in &counters {
            prop_assert_eq!(c.opened(), c.released());
        }
        match failing.filter(|i| *i < handler_count) {
            Some(i) => {
                prop_assert_eq!(single_error_code(&json), "CONNECTION_ERROR");
                prop_assert!(counters[i + 1..].iter().all(|c| c.opened() == 0));
            }
            None => prop_assert_eq!(&json["data"]["f0"], &json!(0)),
        }
    }
}

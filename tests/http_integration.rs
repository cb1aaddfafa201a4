//! HTTP Transport Integration Tests
//!
//! Exercises the axum router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use maas_mcp::core::RetryPolicy;
use maas_mcp::maas::MemoryBackend;
use maas_mcp::mcp::{codes, Dispatcher, DispatcherOptions, MCPServerInfo, Registry};
use maas_mcp::tools;
use maas_mcp::transport::http::{router, CORRELATION_HEADER};

fn app() -> Router {
    let mut registry = Registry::new();
    tools::register_all(&mut registry, Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry()).unwrap();
    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        MCPServerInfo::new("maas-mcp", "test"),
        DispatcherOptions::default(),
    );
    router(Arc::new(dispatcher), CancellationToken::new())
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// ============================================================================
// GET Routes
// ============================================================================

#[tokio::test]
async fn test_health() {
    let response = app().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_discovery_as_json() {
    let response = app().oneshot(Request::get("/mcp").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = body_json(response).await;
    assert_eq!(doc["tools"].as_array().unwrap().len(), 20);
    assert_eq!(doc["resources"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_root_is_discovery_alias() {
    let response = app().oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(body_json(response).await["tools"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_discovery_as_sse_by_accept_header() {
    let request = Request::get("/mcp").header(header::ACCEPT, "text/event-stream").body(Body::empty()).unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let text = body_text(response).await;
    let payload = text.trim().strip_prefix("data: ").unwrap();
    let doc: Value = serde_json::from_str(payload).unwrap();
    assert_eq!(doc["tools"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_discovery_as_sse_by_query() {
    let response = app().oneshot(Request::get("/mcp?sse=true").body(Body::empty()).unwrap()).await.unwrap();
    assert!(body_text(response).await.starts_with("data: "));
}

// ============================================================================
// POST /mcp
// ============================================================================

#[tokio::test]
async fn test_jsonrpc_over_http() {
    let body = json!({"jsonrpc": "2.0", "method": "list_fabrics", "id": 1});
    let response = app().oneshot(post_json("/mcp", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = body_json(response).await;
    assert_eq!(envelope["result"][0]["name"], "fabric-0");
}

#[tokio::test]
async fn test_tool_call_validation_failure_is_still_200() {
    let body = json!({"tool": "create_tag", "params": {}});
    let response = app().oneshot(post_json("/mcp", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let envelope = body_json(response).await;
    assert_eq!(envelope["isError"], true);
    assert!(envelope["content"][0]["text"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_resource_access_with_invalid_uri() {
    let body = json!({"type": "resource_access", "uri": "invalid://uri"});
    let response = app().oneshot(post_json("/mcp", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let envelope = body_json(response).await;
    assert_eq!(envelope["isError"], true);
    assert!(envelope["error"].as_str().unwrap().contains("URI"));
}

#[tokio::test]
async fn test_resource_access_success() {
    let body = json!({"uri": "maas://machine/4y3h7n/power"});
    let response = app().oneshot(post_json("/mcp", &body)).await.unwrap();
    let envelope = body_json(response).await;
    let text = envelope["contents"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<Value>(text).unwrap()["power_state"], "off");
}

#[tokio::test]
async fn test_non_json_content_type_is_400() {
    let request = Request::post("/mcp")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("list machines please"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], codes::PARSE_ERROR);
}

#[tokio::test]
async fn test_unparseable_json_is_400() {
    let request = Request::post("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"jsonrpc\":"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let body = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = app().oneshot(post_json("/mcp", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_text(response).await.is_empty());
}

// ============================================================================
// POST /mcp/:tool
// ============================================================================

#[tokio::test]
async fn test_direct_tool_route() {
    let body = json!({"system_id": "x7q9rt"});
    let response = app().oneshot(post_json("/mcp/list_volume_groups", &body)).await.unwrap();
    let envelope = body_json(response).await;
    let groups: Value = serde_json::from_str(envelope["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(groups[0]["name"], "vgroot");
}

#[tokio::test]
async fn test_direct_tool_route_without_body() {
    let response = app().oneshot(Request::post("/mcp/list_tags").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = body_json(response).await;
    assert!(envelope.get("isError").is_none());
}

#[tokio::test]
async fn test_direct_route_unknown_tool() {
    let response = app().oneshot(post_json("/mcp/wipe_everything", &json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let envelope = body_json(response).await;
    assert_eq!(envelope["isError"], true);
}

// ============================================================================
// Middleware
// ============================================================================

#[tokio::test]
async fn test_cors_preflight() {
    let request = Request::builder().method(Method::OPTIONS).uri("/mcp").body(Body::empty()).unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let request = Request::get("/health").header(CORRELATION_HEADER, "trace-123").body(Body::empty()).unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[CORRELATION_HEADER], "trace-123");
}

#[tokio::test]
async fn test_correlation_id_is_generated() {
    let response = app().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    let id = response.headers()[CORRELATION_HEADER].to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_correlation_id_appears_in_error_data() {
    let request = Request::post("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .header(CORRELATION_HEADER, "trace-err")
        .body(Body::from(json!({"jsonrpc": "2.0", "method": "nope", "id": 1}).to_string()))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let envelope = body_json(response).await;
    assert_eq!(envelope["error"]["data"]["correlation_id"], "trace-err");
}

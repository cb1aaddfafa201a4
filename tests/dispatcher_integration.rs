//! Dispatcher Integration Tests
//!
//! Drives the full catalogue through the public dispatcher API against the
//! seeded in-memory backend.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};

use maas_mcp::core::RetryPolicy;
use maas_mcp::maas::MemoryBackend;
use maas_mcp::mcp::{
    codes, Dispatcher, DispatcherOptions, MCPServerInfo, Registry, RequestContext, Response, Transport,
};
use maas_mcp::tools;

fn dispatcher_with(options: DispatcherOptions) -> Dispatcher {
    let mut registry = Registry::new();
    tools::register_all(&mut registry, Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry()).unwrap();
    Dispatcher::new(Arc::new(registry), MCPServerInfo::new("maas-mcp", "test"), options)
}

fn dispatcher() -> Dispatcher {
    dispatcher_with(DispatcherOptions::default())
}

async fn send(dispatcher: &Dispatcher, raw: &str) -> Value {
    let ctx = RequestContext::new(Transport::Stdio);
    let response = dispatcher.handle_message(raw, &ctx).await.expect("expected a response");
    serde_json::to_value(response).unwrap()
}

// ============================================================================
// Envelope Handling
// ============================================================================

#[tokio::test]
async fn test_read_only_calls_are_idempotent() {
    let dispatcher = dispatcher();
    let ctx = RequestContext::new(Transport::Stdio).with_correlation_id("fixed");
    let raw = r#"{"jsonrpc":"2.0","method":"list_machines","params":{"status":"Ready"},"id":"a"}"#;

    let first = serde_json::to_string(&dispatcher.handle_message(raw, &ctx).await).unwrap();
    let second = serde_json::to_string(&dispatcher.handle_message(raw, &ctx).await).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_jsonrpc_is_accepted_by_default() {
    let response = send(&dispatcher(), r#"{"method":"list_tags","id":1}"#).await;
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_jsonrpc_is_rejected_in_strict_mode() {
    let dispatcher = dispatcher_with(DispatcherOptions { strict_jsonrpc: true });
    let response = send(&dispatcher, r#"{"method":"list_tags","id":7}"#).await;
    assert_eq!(response["error"]["code"], codes::INVALID_REQUEST);
    assert_eq!(response["id"], 7);
}

#[tokio::test]
async fn test_unknown_tool_is_method_not_found() {
    let response = send(&dispatcher(), r#"{"jsonrpc":"2.0","method":"format_disk","id":3}"#).await;
    assert_eq!(response["error"]["code"], codes::METHOD_NOT_FOUND);
    assert!(response["error"]["message"].as_str().unwrap().contains("format_disk"));
}

#[tokio::test]
async fn test_malformed_json_is_parse_error() {
    let response = send(&dispatcher(), "{not json").await;
    assert_eq!(response["error"]["code"], codes::PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_string_ids_are_echoed() {
    let response = send(&dispatcher(), r#"{"jsonrpc":"2.0","method":"ping","id":"req-42"}"#).await;
    assert_eq!(response["id"], "req-42");
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let ctx = RequestContext::new(Transport::Stdio);
    let response = dispatcher()
        .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, &ctx)
        .await;
    assert!(response.is_none());
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_discovery_lists_every_tool_once() {
    let response = send(&dispatcher(), r#"{"jsonrpc":"2.0","method":"discover","id":1}"#).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 20);

    let names: HashSet<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names.len(), tools.len());

    let resources = response["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 7);
    assert_eq!(resources[0]["uriTemplate"], "maas://machine/{system_id}/power");
}

#[tokio::test]
async fn test_tools_list_exposes_input_schemas() {
    let response = send(&dispatcher(), r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    let create_tag = tools.iter().find(|t| t["name"] == "create_tag").unwrap();
    assert_eq!(create_tag["inputSchema"]["type"], "object");
    assert_eq!(create_tag["inputSchema"]["required"], json!(["name"]));
}

// ============================================================================
// Tool Calls
// ============================================================================

#[tokio::test]
async fn test_tools_call_wraps_result_as_text() {
    let raw = r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"get_machine_details","arguments":{"system_id":"4y3h7n"}},"id":5}"#;
    let response = send(&dispatcher(), raw).await;
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let machine: Value = serde_json::from_str(text).unwrap();
    assert_eq!(machine["hostname"], "node-01");
    assert!(response["result"].get("isError").is_none());
}

#[tokio::test]
async fn test_tools_call_reports_failures_in_result() {
    let raw = r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"create_tag","arguments":{}},"id":6}"#;
    let response = send(&dispatcher(), raw).await;
    assert_eq!(response["result"]["isError"], true);
    assert!(response["result"]["content"][0]["text"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn test_validation_failure_is_server_error() {
    let raw = r#"{"jsonrpc":"2.0","method":"get_subnet_details","params":{},"id":8}"#;
    let response = send(&dispatcher(), raw).await;
    assert_eq!(response["error"]["code"], codes::SERVER_ERROR);
    assert_eq!(response["error"]["message"], "missing required field 'id'");
}

#[tokio::test]
async fn test_simplified_tool_call() {
    let ctx = RequestContext::new(Transport::Http);
    let body = json!({"type": "tool_call", "tool": "list_vlans", "params": {"fabric_id": 0}});
    let response = dispatcher().handle_value(body, &ctx).await.unwrap();
    let Response::ToolCall(result) = response else { panic!("expected a tool-call envelope") };
    assert!(!result.is_error());
    let vlans: Value = serde_json::from_str(&result.joined_text()).unwrap();
    assert_eq!(vlans.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_state_changes_are_visible_to_later_calls() {
    let dispatcher = dispatcher();
    send(&dispatcher, r#"{"jsonrpc":"2.0","method":"allocate_machine","params":{"tags":"gpu"},"id":1}"#).await;

    let response =
        send(&dispatcher, r#"{"jsonrpc":"2.0","method":"list_machines","params":{"status":"Allocated"},"id":2}"#)
            .await;
    let machines = response["result"].as_array().unwrap();
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0]["system_id"], "8k2m4p");
}

// ============================================================================
// Resources
// ============================================================================

#[tokio::test]
async fn test_resources_read() {
    let raw = r#"{"jsonrpc":"2.0","method":"resources/read","params":{"uri":"maas://tag/virtual/machines"},"id":1}"#;
    let response = send(&dispatcher(), raw).await;
    let contents = &response["result"]["contents"][0];
    assert_eq!(contents["uri"], "maas://tag/virtual/machines");
    let machines: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(machines.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_simplified_resource_access_with_bad_scheme() {
    let ctx = RequestContext::new(Transport::Http);
    let body = json!({"type": "resource_access", "uri": "invalid://uri"});
    let response = dispatcher().handle_value(body, &ctx).await.unwrap();
    assert!(response.is_error());
    let json = serde_json::to_value(response).unwrap();
    assert!(json["error"].as_str().unwrap().contains("URI"));
}

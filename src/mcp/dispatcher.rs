//! Request dispatcher.
//!
//! Turns one inbound message into at most one response:
//!
//! ```text
//! raw text ──parse──▶ envelope ──resolve──▶ handler ──invoke──▶ result
//!                        │                                        │
//!                        └── JSON-RPC / tool_call / resource ─────┴──▶ Response
//! ```
//!
//! Protocol failures (bad JSON, unknown method) become JSON-RPC error
//! objects. Application failures (bad arguments, upstream errors) become
//! `-32000` errors on direct JSON-RPC calls and `isError: true` results on
//! `tools/call` and the simplified HTTP shapes. Handler panics are caught
//! here and reported as internal errors.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};

use super::context::RequestContext;
use super::discovery::DiscoveryDocument;
use super::error::{McpError, McpResult};
use super::protocol::{
    CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    MCPInitializeParams, MCPInitializeResult, MCPServerCapabilities, MCPServerInfo, McpRequest,
    ReadResourceParams, RequestId, ResourceContents, ResourceResult, Response, JSONRPC_VERSION,
    PROTOCOL_VERSION,
};
use super::registry::Registry;

/// Dispatcher options.
#[derive(Debug, Clone, Default)]
pub struct DispatcherOptions {
    /// Reject envelopes without `"jsonrpc": "2.0"`
    pub strict_jsonrpc: bool,
}

/// Routes parsed requests to registered handlers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    server_info: MCPServerInfo,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Create a dispatcher over a finished registry.
    pub fn new(registry: Arc<Registry>, server_info: MCPServerInfo, options: DispatcherOptions) -> Self {
        Self { registry, server_info, options }
    }

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Advertised server name and version.
    pub fn server_info(&self) -> &MCPServerInfo {
        &self.server_info
    }

    /// Current capabilities document.
    pub fn discover(&self) -> DiscoveryDocument {
        DiscoveryDocument::from_registry(&self.registry, &self.server_info)
    }

    /// Handle one raw message. `None` means nothing should be written back.
    pub async fn handle_message(&self, raw: &str, ctx: &RequestContext) -> Option<Response> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.handle_value(value, ctx).await,
            Err(e) => {
                tracing::debug!(correlation_id = %ctx.correlation_id, error = %e, "unparseable message");
                Some(parse_error(&e, ctx).into())
            }
        }
    }

    /// Handle one parsed JSON body of any supported shape.
    pub async fn handle_value(&self, value: Value, ctx: &RequestContext) -> Option<Response> {
        match McpRequest::detect(&value) {
            Some(Ok(request)) => Some(self.handle_mcp_request(request, ctx).await),
            Some(Err(e)) => Some(CallToolResult::error(format!("Invalid request: {e}")).into()),
            None => match self.parse_request(value, ctx) {
                Ok(request) => self.dispatch(request, ctx).await.map(Response::from),
                Err(response) => Some(response.into()),
            },
        }
    }

    /// Validate a JSON-RPC envelope.
    ///
    /// The id is recovered first so that rejections can still echo it. In
    /// lenient mode a missing or unexpected `jsonrpc` member is logged and
    /// accepted.
    pub fn parse_request(&self, value: Value, ctx: &RequestContext) -> Result<JsonRpcRequest, JsonRpcResponse> {
        let reject = |id: RequestId, message: String| {
            JsonRpcResponse::failure(id, McpError::InvalidRequest(message).to_jsonrpc(&ctx.correlation_id))
        };

        let Value::Object(object) = &value else {
            let what = if value.is_array() { "batch requests are not supported" } else { "expected a JSON object" };
            return Err(reject(RequestId::Null, what.to_string()));
        };
        let id = RequestId::recover(object.get("id"));

        match object.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            other => {
                let found = other.map_or_else(|| "missing".to_string(), Value::to_string);
                if self.options.strict_jsonrpc {
                    return Err(reject(id, format!("unsupported jsonrpc version: {found}")));
                }
                tracing::warn!(jsonrpc = %found, correlation_id = %ctx.correlation_id, "accepting non-2.0 envelope");
            }
        }

        let mut request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => return Err(reject(id, e.to_string())),
        };
        request.jsonrpc = Some(JSONRPC_VERSION.to_string());
        Ok(request)
    }

    /// Dispatch a JSON-RPC request. Notifications yield `None`.
    pub async fn dispatch(&self, request: JsonRpcRequest, ctx: &RequestContext) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        }

        let id = request.response_id();
        tracing::debug!(method = %request.method, correlation_id = %ctx.correlation_id, transport = %ctx.transport, "dispatching");

        let outcome = match request.method.as_str() {
            "discover" => to_value(self.discover()),
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => {
                to_value(ListToolsResult { tools: self.registry.list_tools().map(|t| t.to_mcp()).collect() })
            }
            "tools/call" => self.tools_call(request.params, ctx).await,
            "resources/list" | "resources/templates/list" => {
                let resources: Vec<_> = self.registry.list_resources().map(|r| r.to_mcp()).collect();
                if request.method == "resources/list" {
                    Ok(json!({ "resources": resources }))
                } else {
                    Ok(json!({ "resourceTemplates": resources }))
                }
            }
            "resources/read" => self.resources_read(request.params, ctx).await,
            method => self.call_tool(method, request.params, ctx).await,
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::info!(error = %e, code = e.code(), correlation_id = %ctx.correlation_id, "request failed");
                JsonRpcResponse::failure(id, e.to_jsonrpc(&ctx.correlation_id))
            }
        })
    }

    /// Handle a simplified HTTP request.
    pub async fn handle_mcp_request(&self, request: McpRequest, ctx: &RequestContext) -> Response {
        match request {
            McpRequest::ToolCall { tool, params } => self.call_tool_envelope(&tool, params, ctx).await.into(),
            McpRequest::ResourceAccess { uri } => self.read_resource_envelope(&uri, ctx).await.into(),
        }
    }

    /// Invoke a tool by name.
    pub async fn call_tool(&self, name: &str, params: Option<Value>, ctx: &RequestContext) -> McpResult<Value> {
        let tool = self.registry.get_tool(name).ok_or_else(|| McpError::MethodNotFound(name.to_string()))?;
        let params = tool.input_schema.prepare(params)?;

        tracing::debug!(tool = name, correlation_id = %ctx.correlation_id, "invoking tool");
        let future = tool.handler.call(ctx.clone(), params);
        guard(future, ctx).await
    }

    /// Invoke a tool and wrap the outcome in the MCP tool-call envelope.
    pub async fn call_tool_envelope(&self, name: &str, params: Option<Value>, ctx: &RequestContext) -> CallToolResult {
        match self.call_tool(name, params, ctx).await {
            Ok(value) => match serde_json::to_string(&value) {
                Ok(text) => CallToolResult::text(text),
                Err(e) => CallToolResult::error(McpError::from(e).public_message()),
            },
            Err(e) => {
                tracing::info!(tool = name, error = %e, correlation_id = %ctx.correlation_id, "tool call failed");
                CallToolResult::error(e.public_message())
            }
        }
    }

    /// Resolve and read a resource.
    pub async fn read_resource(&self, uri: &str, ctx: &RequestContext) -> McpResult<ResourceContents> {
        let (resource, params) = self.registry.resolve_resource(uri)?;

        tracing::debug!(resource = %resource.name, uri, correlation_id = %ctx.correlation_id, "reading resource");
        let future = resource.handler.read(ctx.clone(), params);
        let value = guard(future, ctx).await?;
        Ok(ResourceContents { uri: uri.to_string(), text: serde_json::to_string(&value)?, mime_type: resource.mime_type.clone() })
    }

    /// Read a resource and wrap the outcome in the resource-access envelope.
    pub async fn read_resource_envelope(&self, uri: &str, ctx: &RequestContext) -> ResourceResult {
        match self.read_resource(uri, ctx).await {
            Ok(contents) => ResourceResult::Contents { contents: vec![contents] },
            Err(e) => {
                tracing::info!(uri, error = %e, correlation_id = %ctx.correlation_id, "resource read failed");
                ResourceResult::error(e.public_message())
            }
        }
    }

    fn initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: MCPInitializeParams = match params {
            None | Some(Value::Null) => MCPInitializeParams::default(),
            Some(value) => serde_json::from_value(value).map_err(|e| McpError::InvalidParams(e.to_string()))?,
        };
        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, client_version = %client.version, requested = ?params.protocol_version, "client initialized");
        }

        to_value(MCPInitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: MCPServerCapabilities { tools: Some(json!({})), resources: Some(json!({})) },
            server_info: self.server_info.clone(),
        })
    }

    async fn tools_call(&self, params: Option<Value>, ctx: &RequestContext) -> McpResult<Value> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        if self.registry.get_tool(&params.name).is_none() {
            return Err(McpError::MethodNotFound(params.name));
        }
        to_value(self.call_tool_envelope(&params.name, params.arguments, ctx).await)
    }

    async fn resources_read(&self, params: Option<Value>, ctx: &RequestContext) -> McpResult<Value> {
        let params: ReadResourceParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let contents = self.read_resource(&params.uri, ctx).await?;
        Ok(json!({ "contents": [contents] }))
    }
}

fn to_value<T: serde::Serialize>(value: T) -> McpResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn parse_error(error: &serde_json::Error, ctx: &RequestContext) -> JsonRpcResponse {
    JsonRpcResponse::failure(RequestId::Null, McpError::Parse(error.to_string()).to_jsonrpc(&ctx.correlation_id))
}

/// Build the parse-error envelope for a body that is not JSON at all.
pub fn parse_error_response(message: &str, ctx: &RequestContext) -> JsonRpcResponse {
    JsonRpcResponse::failure(RequestId::Null, McpError::Parse(message.to_string()).to_jsonrpc(&ctx.correlation_id))
}

/// Run a handler future, converting a panic into an internal error.
async fn guard<F>(future: F, ctx: &RequestContext) -> McpResult<Value>
where
    F: std::future::Future<Output = McpResult<Value>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            tracing::error!(
                correlation_id = %ctx.correlation_id,
                panic = panic_message(panic.as_ref()),
                backtrace = %std::backtrace::Backtrace::force_capture(),
                "handler panicked"
            );
            Err(McpError::Internal { correlation_id: ctx.correlation_id.clone() })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

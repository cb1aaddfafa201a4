//! MCP Protocol types.
//!
//! JSON-RPC 2.0 envelopes, the MCP method payloads the bridge answers, and
//! the simplified HTTP tool-call and resource-access shapes.
//! Protocol reference: https://modelcontextprotocol.io/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC version emitted on every response.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request.
///
/// `jsonrpc` and `id` are optional so that simplified envelopes and
/// notifications deserialize; the dispatcher decides what to accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version ("2.0" when well-formed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Request ID, absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Method name
    pub method: String,
    /// Parameters (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Whether this request expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.starts_with("notifications/")
    }

    /// The id to echo back, `null` when absent.
    pub fn response_id(&self) -> RequestId {
        self.id.clone().unwrap_or_default()
    }
}

/// JSON-RPC request ID (string, number or null).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Numeric ID, kept as received (fractional and unsigned ids included)
    Number(serde_json::Number),
    /// Explicit or unrecoverable null
    #[default]
    Null,
}

impl RequestId {
    /// Recover an id from an arbitrary JSON value, falling back to null.
    pub fn recover(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self::String(s.clone()),
            Some(Value::Number(n)) => Self::Number(n.clone()),
            _ => Self::Null,
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 response.
///
/// Build with [`JsonRpcResponse::success`] or [`JsonRpcResponse::failure`];
/// exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Result (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request ID
    pub id: RequestId,
}

impl JsonRpcResponse {
    /// Successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), result: Some(result), error: None, id }
    }

    /// Error response.
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), result: None, error: Some(error), id }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// JSON-RPC 2.0 notification (no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), method: method.into(), params }
    }
}

// ============================================================================
// MCP-specific message types
// ============================================================================

/// MCP initialize request parameters.
///
/// Every member is optional; clients differ in what they send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MCPInitializeParams {
    /// Protocol version requested by the client
    pub protocol_version: Option<String>,
    /// Client capabilities
    pub capabilities: Option<Value>,
    /// Client info
    pub client_info: Option<MCPServerInfo>,
}

/// MCP initialize response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCPInitializeResult {
    /// Protocol version
    pub protocol_version: String,
    /// Server capabilities
    pub capabilities: MCPServerCapabilities,
    /// Server info
    pub server_info: MCPServerInfo,
}

/// Name and version of an MCP peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MCPServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    #[serde(default)]
    pub version: String,
}

impl MCPServerInfo {
    /// Create server info.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}

/// MCP server capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MCPServerCapabilities {
    /// Tool capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Resource capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
}

/// MCP tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCPTool {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Input schema (JSON Schema)
    pub input_schema: MCPToolInputSchema,
}

/// MCP tool input schema (JSON Schema subset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property schemas keyed by name
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// MCP resource template descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MCPResource {
    /// Resource name
    pub name: String,
    /// Resource description
    pub description: String,
    /// URI template, e.g. `maas://machine/{system_id}`
    pub uri_template: String,
    /// MIME type of the contents
    pub mime_type: String,
}

/// Result from listing tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Available tools
    pub tools: Vec<MCPTool>,
}

/// Parameters for calling a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name
    pub name: String,
    /// Tool arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Parameters for reading a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// Concrete resource URI
    pub uri: String,
}

/// Result from calling a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Successful result carrying one text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![ToolContent::Text { text: text.into() }], is_error: None }
    }

    /// Error result carrying one text block.
    pub fn error(message: impl Into<String>) -> Self {
        Self { content: vec![ToolContent::Text { text: message.into() }], is_error: Some(true) }
    }

    /// Whether this result reports a failure.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Concatenated text content.
    pub fn joined_text(&self) -> String {
        self.content.iter().filter_map(ToolContent::as_text).collect::<Vec<_>>().join("\n")
    }
}

/// Content from a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content
    Text {
        /// The text content
        text: String,
    },
}

impl ToolContent {
    /// Get text content if this is a text type.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolContent::Text { text } => Some(text),
        }
    }
}

/// One resource body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// URI that was read
    pub uri: String,
    /// Serialized body
    pub text: String,
    /// MIME type of `text`
    pub mime_type: String,
}

/// Resource-access response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceResult {
    /// Resolved contents
    Contents {
        /// Resource bodies
        contents: Vec<ResourceContents>,
    },
    /// Resolution or read failure
    Error {
        /// Always true
        #[serde(rename = "isError")]
        is_error: bool,
        /// Error message
        error: String,
    },
}

impl ResourceResult {
    /// Failure envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { is_error: true, error: message.into() }
    }

    /// Whether this result reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Simplified HTTP request shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpRequest {
    /// Invoke a tool by name
    ToolCall {
        /// Tool name
        tool: String,
        /// Tool parameters
        #[serde(default)]
        params: Option<Value>,
    },
    /// Read a resource by URI
    ResourceAccess {
        /// Concrete resource URI
        uri: String,
    },
}

impl McpRequest {
    /// Recognize a simplified request body.
    ///
    /// Bodies with an explicit `type` are taken at their word. Untyped
    /// bodies count as a tool call when they carry `tool`, or as a resource
    /// access when they carry `uri`, and in both cases no `method`.
    pub fn detect(body: &Value) -> Option<Result<Self, serde_json::Error>> {
        let object = body.as_object()?;
        let kind = match object.get("type").and_then(Value::as_str) {
            Some(kind @ ("tool_call" | "resource_access")) => kind,
            Some(_) => return None,
            None if object.contains_key("method") => return None,
            None if object.contains_key("tool") => "tool_call",
            None if object.contains_key("uri") => "resource_access",
            None => return None,
        };

        let mut tagged = object.clone();
        tagged.insert("type".to_string(), Value::String(kind.to_string()));
        Some(serde_json::from_value(Value::Object(tagged)))
    }
}

/// Any response the dispatcher produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// JSON-RPC envelope
    JsonRpc(JsonRpcResponse),
    /// MCP tool-call envelope
    ToolCall(CallToolResult),
    /// MCP resource-access envelope
    Resource(ResourceResult),
}

impl Response {
    /// Whether the response reports a failure of any kind.
    pub fn is_error(&self) -> bool {
        match self {
            Self::JsonRpc(response) => !response.is_success(),
            Self::ToolCall(result) => result.is_error(),
            Self::Resource(result) => result.is_error(),
        }
    }
}

impl From<JsonRpcResponse> for Response {
    fn from(response: JsonRpcResponse) -> Self {
        Self::JsonRpc(response)
    }
}

impl From<CallToolResult> for Response {
    fn from(result: CallToolResult) -> Self {
        Self::ToolCall(result)
    }
}

impl From<ResourceResult> for Response {
    fn from(result: ResourceResult) -> Self {
        Self::Resource(result)
    }
}

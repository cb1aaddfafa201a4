//! MCP (Model Context Protocol) server core.
//!
//! This module owns everything between the transports and the backend:
//! wire types, the tool/resource registry, the dispatcher and the
//! discovery document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ stdio adapter│   │ HTTP adapter │
//! └──────┬───────┘   └──────┬───────┘
//!        └────────┬─────────┘
//!                 ▼
//!          ┌─────────────┐      ┌──────────────┐
//!          │ Dispatcher  │─────▶│  Discovery   │
//!          └──────┬──────┘      └──────────────┘
//!                 ▼
//!          ┌─────────────┐
//!          │  Registry   │  tools by name, resources by URI template
//!          └──────┬──────┘
//!                 ▼
//!        tool handlers ──retry──▶ BackendClient
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use maas_mcp::mcp::{Dispatcher, DispatcherOptions, Registry, RequestContext, Transport};
//!
//! let mut registry = Registry::new();
//! maas_mcp::tools::register_all(&mut registry, backend, retry_policy)?;
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry), server_info, DispatcherOptions::default());
//! let ctx = RequestContext::new(Transport::Stdio);
//! let response = dispatcher.handle_message(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#, &ctx).await;
//! ```

mod context;
mod discovery;
mod dispatcher;
mod error;
pub mod handshake;
mod protocol;
mod registry;
mod schema;
mod uri;

pub use context::{RequestContext, Transport};
pub use discovery::DiscoveryDocument;
pub use dispatcher::{parse_error_response, Dispatcher, DispatcherOptions};
pub use error::{codes, McpError, McpResult};
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, MCPInitializeParams, MCPInitializeResult, MCPResource,
    MCPServerCapabilities, MCPServerInfo, MCPTool, MCPToolInputSchema, McpRequest,
    ReadResourceParams, RequestId, ResourceContents, ResourceResult, Response, ToolContent,
    JSONRPC_VERSION, PROTOCOL_VERSION,
};
pub use registry::{
    Registry, RegistryError, ResourceHandler, ResourceInfo, ToolHandler, ToolInfo,
};
pub use uri::{uri_scheme, UriParams, UriTemplate, UriTemplateError};

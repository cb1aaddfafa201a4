//! Tool and resource registry.
//!
//! Built once at startup and shared read-only behind an `Arc`. Tools are
//! looked up by exact name; resources by matching a concrete URI against
//! each registered template in registration order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::context::RequestContext;
use super::error::{McpError, McpResult};
use super::protocol::{MCPResource, MCPTool, MCPToolInputSchema};
use super::uri::{uri_scheme, UriParams, UriTemplate, UriTemplateError};

/// Handler behind a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with prepared arguments.
    async fn call(&self, ctx: RequestContext, params: Value) -> McpResult<Value>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(RequestContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    async fn call(&self, ctx: RequestContext, params: Value) -> McpResult<Value> {
        self(ctx, params).await
    }
}

/// Handler behind a resource template.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Read the resource identified by the extracted URI parameters.
    async fn read(&self, ctx: RequestContext, params: UriParams) -> McpResult<Value>;
}

#[async_trait]
impl<F, Fut> ResourceHandler for F
where
    F: Fn(RequestContext, UriParams) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    async fn read(&self, ctx: RequestContext, params: UriParams) -> McpResult<Value> {
        self(ctx, params).await
    }
}

/// A registered tool.
#[derive(Clone)]
pub struct ToolInfo {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Argument schema
    pub input_schema: MCPToolInputSchema,
    /// Handler
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolInfo {
    /// Create a tool backed by an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: MCPToolInputSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    /// MCP descriptor.
    pub fn to_mcp(&self) -> MCPTool {
        MCPTool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl std::fmt::Debug for ToolInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInfo").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A registered resource template.
#[derive(Clone)]
pub struct ResourceInfo {
    /// Unique resource name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Compiled URI template
    pub template: UriTemplate,
    /// MIME type of the contents
    pub mime_type: String,
    /// Handler
    pub handler: Arc<dyn ResourceHandler>,
}

impl ResourceInfo {
    /// Create a JSON resource backed by an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        uri_pattern: &str,
        handler: F,
    ) -> Result<Self, RegistryError>
    where
        F: Fn(RequestContext, UriParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        Ok(Self {
            name: name.into(),
            description: description.into(),
            template: UriTemplate::parse(uri_pattern)?,
            mime_type: "application/json".to_string(),
            handler: Arc::new(handler),
        })
    }

    /// The URI pattern as written.
    pub fn uri_pattern(&self) -> &str {
        self.template.as_str()
    }

    /// MCP descriptor.
    pub fn to_mcp(&self) -> MCPResource {
        MCPResource {
            name: self.name.clone(),
            description: self.description.clone(),
            uri_template: self.uri_pattern().to_string(),
            mime_type: self.mime_type.clone(),
        }
    }
}

impl std::fmt::Debug for ResourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceInfo")
            .field("name", &self.name)
            .field("template", &self.template.as_str())
            .finish_non_exhaustive()
    }
}

/// Error type for registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error(transparent)]
    InvalidTemplate(#[from] UriTemplateError),
}

/// Registry of tools and resources.
#[derive(Debug, Default)]
pub struct Registry {
    tools: Vec<ToolInfo>,
    tool_index: HashMap<String, usize>,
    resources: Vec<ResourceInfo>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails without side effects if the name is taken.
    pub fn register_tool(&mut self, info: ToolInfo) -> Result<(), RegistryError> {
        if self.tool_index.contains_key(&info.name) {
            return Err(RegistryError::DuplicateName { kind: "tool", name: info.name });
        }
        self.tool_index.insert(info.name.clone(), self.tools.len());
        self.tools.push(info);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get_tool(&self, name: &str) -> Option<&ToolInfo> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    /// Register a resource. Fails without side effects if the name or
    /// pattern is taken.
    pub fn register_resource(&mut self, info: ResourceInfo) -> Result<(), RegistryError> {
        if self.resources.iter().any(|r| r.name == info.name || r.uri_pattern() == info.uri_pattern()) {
            return Err(RegistryError::DuplicateName { kind: "resource", name: info.name });
        }
        self.resources.push(info);
        Ok(())
    }

    /// Get a resource by name.
    pub fn get_resource(&self, name: &str) -> Option<&ResourceInfo> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resolve a concrete URI to the first matching resource.
    ///
    /// A URI whose scheme no template uses is invalid; a URI with a known
    /// scheme that matches no template is not found.
    pub fn resolve_resource(&self, uri: &str) -> McpResult<(&ResourceInfo, UriParams)> {
        if let Some(hit) = self.resources.iter().find_map(|r| r.template.matches(uri).map(|p| (r, p))) {
            return Ok(hit);
        }

        let known_scheme =
            uri_scheme(uri).is_some_and(|s| self.resources.iter().any(|r| r.template.scheme() == s));
        if known_scheme {
            Err(McpError::ResourceNotFound(uri.to_string()))
        } else {
            Err(McpError::InvalidUri(uri.to_string()))
        }
    }

    /// Registered tools in registration order.
    pub fn list_tools(&self) -> impl Iterator<Item = &ToolInfo> + '_ {
        self.tools.iter()
    }

    /// Registered resources in registration order.
    pub fn list_resources(&self) -> impl Iterator<Item = &ResourceInfo> + '_ {
        self.resources.iter()
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Number of registered resources.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

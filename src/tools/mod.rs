//! Tool and resource catalogue.
//!
//! Every handler goes through [`Toolbox::call`], which runs the backend
//! operation under the configured [`RetryPolicy`] and the request's
//! cancellation token, then serializes the result.

mod machines;
mod network;
mod resources;
mod storage;
mod tags;

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::{retry_async, RetryPolicy};
use crate::maas::{BackendClient, BackendResult};
use crate::mcp::{
    MCPToolInputSchema, McpError, McpResult, Registry, RegistryError, RequestContext, ResourceInfo,
    ToolInfo, UriParams,
};

/// Shared state captured by every handler.
#[derive(Clone)]
pub struct Toolbox {
    backend: Arc<dyn BackendClient>,
    retry: RetryPolicy,
}

impl Toolbox {
    /// Create a toolbox.
    pub fn new(backend: Arc<dyn BackendClient>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// The backend.
    pub fn backend(&self) -> &dyn BackendClient {
        self.backend.as_ref()
    }

    /// Build a tool whose handler receives a clone of this toolbox.
    pub fn tool<F, Fut>(
        &self,
        name: &str,
        description: &str,
        schema: MCPToolInputSchema,
        handler: F,
    ) -> ToolInfo
    where
        F: Fn(Toolbox, RequestContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        let toolbox = self.clone();
        ToolInfo::new(name, description, schema, move |ctx, params| handler(toolbox.clone(), ctx, params))
    }

    /// Build a JSON resource whose handler receives a clone of this toolbox.
    pub fn resource<F, Fut>(
        &self,
        name: &str,
        description: &str,
        uri_pattern: &str,
        handler: F,
    ) -> Result<ResourceInfo, RegistryError>
    where
        F: Fn(Toolbox, RequestContext, UriParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        let toolbox = self.clone();
        ResourceInfo::new(name, description, uri_pattern, move |ctx, params| {
            handler(toolbox.clone(), ctx, params)
        })
    }

    /// Run a backend operation with retries and serialize its result.
    pub async fn call<T, F, Fut>(&self, ctx: &RequestContext, operation: F) -> McpResult<Value>
    where
        T: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let outcome = retry_async(&self.retry, &ctx.cancel, operation).await;
        if outcome.was_retried() {
            tracing::debug!(
                attempts = outcome.attempts,
                elapsed_ms = outcome.total_time.as_millis() as u64,
                correlation_id = %ctx.correlation_id,
                "backend call retried"
            );
        }
        let value = outcome.into_result()?;
        Ok(serde_json::to_value(value)?)
    }
}

/// Deserialize prepared arguments into a request type.
pub(crate) fn parse_args<T: DeserializeOwned>(params: Value) -> McpResult<T> {
    serde_json::from_value(params).map_err(|e| McpError::validation(format!("invalid parameters: {e}")))
}

/// Extract a required string argument.
pub(crate) fn required_str(params: &Value, name: &str) -> McpResult<String> {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| McpError::missing_field(name))
}

/// Extract a required integer argument.
pub(crate) fn required_i64(params: &Value, name: &str) -> McpResult<i64> {
    params.get(name).and_then(Value::as_i64).ok_or_else(|| McpError::missing_field(name))
}

/// Extract an optional string argument.
pub(crate) fn optional_str(params: &Value, name: &str) -> Option<String> {
    params.get(name).and_then(Value::as_str).map(String::from)
}

/// Register every tool and resource.
pub fn register_all(
    registry: &mut Registry,
    backend: Arc<dyn BackendClient>,
    retry: RetryPolicy,
) -> Result<(), RegistryError> {
    let toolbox = Toolbox::new(backend, retry);
    machines::register(registry, &toolbox)?;
    network::register(registry, &toolbox)?;
    tags::register(registry, &toolbox)?;
    storage::register(registry, &toolbox)?;
    resources::register(registry, &toolbox)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::maas::MemoryBackend;
    use crate::mcp::{Dispatcher, DispatcherOptions, MCPServerInfo, Transport};

    /// Dispatcher over every tool, backed by the given in-memory backend.
    pub fn dispatcher(backend: Arc<MemoryBackend>, retry: RetryPolicy) -> Dispatcher {
        let mut registry = Registry::new();
        register_all(&mut registry, backend, retry).unwrap();
        Dispatcher::new(Arc::new(registry), MCPServerInfo::new("maas-mcp", "test"), DispatcherOptions::default())
    }

    /// Call a tool and return its JSON result.
    pub async fn call(dispatcher: &Dispatcher, tool: &str, params: Value) -> McpResult<Value> {
        dispatcher.call_tool(tool, Some(params), &RequestContext::new(Transport::Http)).await
    }
}

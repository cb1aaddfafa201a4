//! Capabilities document served by `discover`, `GET /mcp` and the `tools`
//! CLI command.

use serde::{Deserialize, Serialize};

use super::protocol::{MCPResource, MCPServerInfo, MCPTool};
use super::registry::Registry;

/// Full enumeration of what the server offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    /// Tools in registration order
    pub tools: Vec<MCPTool>,
    /// Resource templates in registration order
    pub resources: Vec<MCPResource>,
    /// Server name and version
    pub server_info: MCPServerInfo,
}

impl DiscoveryDocument {
    /// Snapshot a registry.
    pub fn from_registry(registry: &Registry, server_info: &MCPServerInfo) -> Self {
        Self {
            tools: registry.list_tools().map(|t| t.to_mcp()).collect(),
            resources: registry.list_resources().map(|r| r.to_mcp()).collect(),
            server_info: server_info.clone(),
        }
    }

    /// The document as a single Server-Sent-Events frame.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }

    /// Plain-text listing for terminals.
    pub fn render_text(&self) -> String {
        let mut out = format!("{} {}\n\nTools ({}):\n", self.server_info.name, self.server_info.version, self.tools.len());
        let width = self.tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
        for tool in &self.tools {
            out.push_str(&format!("  {:width$}  {}\n", tool.name, tool.description));
        }

        out.push_str(&format!("\nResources ({}):\n", self.resources.len()));
        let width = self.resources.iter().map(|r| r.uri_template.len()).max().unwrap_or(0);
        for resource in &self.resources {
            out.push_str(&format!("  {:width$}  {}\n", resource.uri_template, resource.description));
        }
        out
    }
}

//! Tag management tools.

use serde_json::{json, Value};

use super::{parse_args, required_str, Toolbox};
use crate::maas::NewTag;
use crate::mcp::{MCPToolInputSchema, McpError, McpResult, Registry, RegistryError};

fn system_ids(params: &Value) -> McpResult<Vec<String>> {
    let ids: Vec<String> = params
        .get("system_ids")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::validation(format!("invalid system_ids: {e}")))?
        .unwrap_or_default();
    if ids.is_empty() {
        return Err(McpError::validation("system_ids must not be empty"));
    }
    Ok(ids)
}

fn membership_schema() -> MCPToolInputSchema {
    MCPToolInputSchema::object()
        .string("tag", "Tag name", true)
        .string_array("system_ids", "System IDs of the machines", true)
}

pub(super) fn register(registry: &mut Registry, toolbox: &Toolbox) -> Result<(), RegistryError> {
    registry.register_tool(toolbox.tool(
        "list_tags",
        "List all tags",
        MCPToolInputSchema::object(),
        |tb, ctx, _params| async move { tb.call(&ctx, || tb.backend().list_tags()).await },
    ))?;

    registry.register_tool(toolbox.tool(
        "create_tag",
        "Create a tag",
        MCPToolInputSchema::object()
            .string("name", "Tag name", true)
            .string("comment", "Free-form description", false)
            .string("definition", "XPath expression for automatic tagging", false)
            .string("kernel_opts", "Kernel options for tagged machines", false),
        |tb, ctx, params| async move {
            let tag: NewTag = parse_args(params)?;
            tb.call(&ctx, || tb.backend().create_tag(&tag)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "add_tag_to_machines",
        "Apply a tag to one or more machines",
        membership_schema(),
        |tb, ctx, params| async move {
            let tag = required_str(&params, "tag")?;
            let ids = system_ids(&params)?;
            tb.call(&ctx, || tb.backend().add_tag_to_machines(&tag, &ids)).await?;
            Ok(json!({ "tag": tag, "added": ids }))
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "remove_tag_from_machines",
        "Remove a tag from one or more machines",
        membership_schema(),
        |tb, ctx, params| async move {
            let tag = required_str(&params, "tag")?;
            let ids = system_ids(&params)?;
            tb.call(&ctx, || tb.backend().remove_tag_from_machines(&tag, &ids)).await?;
            Ok(json!({ "tag": tag, "removed": ids }))
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "get_tagged_machines",
        "List the machines carrying a tag",
        MCPToolInputSchema::object().string("tag", "Tag name", true),
        |tb, ctx, params| async move {
            let tag = required_str(&params, "tag")?;
            tb.call(&ctx, || tb.backend().tagged_machines(&tag)).await
        },
    ))?;

    Ok(())
}

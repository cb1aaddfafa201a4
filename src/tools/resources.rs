//! Read-only `maas://` resources.

use serde_json::json;

use super::Toolbox;
use crate::maas::{MachineFilter, PowerState};
use crate::mcp::{McpError, McpResult, Registry, RegistryError, UriParams};

fn param(params: &UriParams, name: &str) -> McpResult<String> {
    params.get(name).cloned().ok_or_else(|| McpError::missing_field(name))
}

pub(super) fn register(registry: &mut Registry, toolbox: &Toolbox) -> Result<(), RegistryError> {
    registry.register_resource(toolbox.resource(
        "machine_power",
        "Current power state of a machine",
        "maas://machine/{system_id}/power",
        |tb, ctx, params| async move {
            let system_id = param(&params, "system_id")?;
            let state = tb.call(&ctx, || tb.backend().power_state(&system_id)).await?;
            let state: PowerState = serde_json::from_value(state)?;
            Ok(json!({ "system_id": system_id, "power_state": state.state }))
        },
    )?)?;

    registry.register_resource(toolbox.resource(
        "machine_block_devices",
        "Block devices of a machine",
        "maas://machine/{system_id}/block-devices",
        |tb, ctx, params| async move {
            let system_id = param(&params, "system_id")?;
            tb.call(&ctx, || tb.backend().list_block_devices(&system_id)).await
        },
    )?)?;

    registry.register_resource(toolbox.resource(
        "machine",
        "Full record of a machine",
        "maas://machine/{system_id}",
        |tb, ctx, params| async move {
            let system_id = param(&params, "system_id")?;
            tb.call(&ctx, || tb.backend().get_machine(&system_id)).await
        },
    )?)?;

    registry.register_resource(toolbox.resource(
        "subnet",
        "A subnet by ID",
        "maas://subnet/{id}",
        |tb, ctx, params| async move {
            let raw = param(&params, "id")?;
            let id: i64 = raw
                .parse()
                .map_err(|_| McpError::validation(format!("subnet id must be an integer, got '{raw}'")))?;
            tb.call(&ctx, || tb.backend().get_subnet(id)).await
        },
    )?)?;

    registry.register_resource(toolbox.resource(
        "tag_machines",
        "Machines carrying a tag",
        "maas://tag/{name}/machines",
        |tb, ctx, params| async move {
            let name = param(&params, "name")?;
            tb.call(&ctx, || tb.backend().tagged_machines(&name)).await
        },
    )?)?;

    registry.register_resource(toolbox.resource(
        "tag",
        "A tag by name",
        "maas://tag/{name}",
        |tb, ctx, params| async move {
            let name = param(&params, "name")?;
            tb.call(&ctx, || tb.backend().get_tag(&name)).await
        },
    )?)?;

    registry.register_resource(toolbox.resource(
        "machines",
        "Every machine known to MAAS",
        "maas://machines",
        |tb, ctx, _params| async move {
            let filter = MachineFilter::default();
            tb.call(&ctx, || tb.backend().list_machines(&filter)).await
        },
    )?)?;

    Ok(())
}

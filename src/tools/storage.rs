//! Read-only storage tools.

use super::{required_str, Toolbox};
use crate::mcp::{MCPToolInputSchema, Registry, RegistryError};

fn schema() -> MCPToolInputSchema {
    MCPToolInputSchema::object().string("system_id", "MAAS system ID of the machine", true)
}

pub(super) fn register(registry: &mut Registry, toolbox: &Toolbox) -> Result<(), RegistryError> {
    registry.register_tool(toolbox.tool(
        "list_block_devices",
        "List the block devices of a machine",
        schema(),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            tb.call(&ctx, || tb.backend().list_block_devices(&system_id)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "list_volume_groups",
        "List the LVM volume groups of a machine",
        schema(),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            tb.call(&ctx, || tb.backend().list_volume_groups(&system_id)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "list_raids",
        "List the software RAID sets of a machine",
        schema(),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            tb.call(&ctx, || tb.backend().list_raids(&system_id)).await
        },
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::core::RetryPolicy;
    use crate::maas::MemoryBackend;
    use crate::tools::testing::{call, dispatcher};

    #[tokio::test]
    async fn test_storage_listings() {
        let d = dispatcher(Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry());

        let disks = call(&d, "list_block_devices", json!({"system_id": "x7q9rt"})).await.unwrap();
        assert_eq!(disks[0]["name"], "sda");
        assert_eq!(disks[0]["type"], "physical");

        let groups = call(&d, "list_volume_groups", json!({"system_id": "x7q9rt"})).await.unwrap();
        assert_eq!(groups[0]["name"], "vgroot");

        let raids = call(&d, "list_raids", json!({"system_id": "4y3h7n"})).await.unwrap();
        assert!(raids.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_machine() {
        let d = dispatcher(Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry());
        assert!(call(&d, "list_raids", json!({"system_id": "missing"})).await.is_err());
    }
}

//! Machine lifecycle tools.

use serde_json::json;

use super::{optional_str, parse_args, required_str, Toolbox};
use crate::maas::{AllocateRequest, DeployRequest, MachineFilter, PowerOffRequest, ReleaseRequest};
use crate::mcp::{MCPToolInputSchema, Registry, RegistryError};

fn system_id_schema() -> MCPToolInputSchema {
    MCPToolInputSchema::object().string("system_id", "MAAS system ID of the machine", true)
}

pub(super) fn register(registry: &mut Registry, toolbox: &Toolbox) -> Result<(), RegistryError> {
    registry.register_tool(toolbox.tool(
        "list_machines",
        "List machines, optionally filtered by hostname, zone, pool, status or tags",
        MCPToolInputSchema::object()
            .string("hostname", "Exact hostname", false)
            .string("zone", "Availability zone name", false)
            .string("pool", "Resource pool name", false)
            .string("status", "Status name, e.g. Ready or Deployed", false)
            .string_array("tags", "Machines must carry all of these tags", false)
            .integer("offset", "Number of matching machines to skip", false)
            .integer("limit", "Maximum number of machines to return", false),
        |tb, ctx, params| async move {
            let filter: MachineFilter = parse_args(params)?;
            tb.call(&ctx, || tb.backend().list_machines(&filter)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "get_machine_details",
        "Get the full record of one machine",
        system_id_schema(),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            tb.call(&ctx, || tb.backend().get_machine(&system_id)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "allocate_machine",
        "Allocate a Ready machine matching the given constraints",
        MCPToolInputSchema::object()
            .string("name", "Hostname of a specific machine", false)
            .integer("min_cpu_count", "Minimum number of CPU cores", false)
            .integer("min_memory", "Minimum memory in MiB", false)
            .string_array("tags", "Required tags", false)
            .string("zone", "Availability zone name", false)
            .string("pool", "Resource pool name", false)
            .string("arch", "Architecture, e.g. amd64", false)
            .string("comment", "Comment for the event log", false),
        |tb, ctx, params| async move {
            let request: AllocateRequest = parse_args(params)?;
            tb.call(&ctx, || tb.backend().allocate_machine(&request)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "deploy_machine",
        "Deploy an operating system to an allocated machine",
        system_id_schema()
            .string("distro_series", "OS release, e.g. jammy", false)
            .string("hwe_kernel", "Hardware enablement kernel", false)
            .string("user_data", "Cloud-init user data", false)
            .string("comment", "Comment for the event log", false),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            let request: DeployRequest = parse_args(params)?;
            tb.call(&ctx, || tb.backend().deploy_machine(&system_id, &request)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "release_machine",
        "Release a machine back to the Ready pool",
        system_id_schema()
            .boolean("erase", "Erase disks before release", false)
            .boolean("quick_erase", "Use quick erase", false)
            .string("comment", "Comment for the event log", false),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            let request: ReleaseRequest = parse_args(params)?;
            tb.call(&ctx, || tb.backend().release_machine(&system_id, &request)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "get_machine_power_state",
        "Query the BMC for the current power state of a machine",
        system_id_schema(),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            let state = tb.call(&ctx, || tb.backend().power_state(&system_id)).await?;
            Ok(json!({ "system_id": system_id, "power_state": state["state"] }))
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "power_on_machine",
        "Power a machine on",
        system_id_schema().string("comment", "Comment for the event log", false),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            let comment = optional_str(&params, "comment");
            tb.call(&ctx, || tb.backend().power_on(&system_id, comment.as_deref())).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "power_off_machine",
        "Power a machine off",
        system_id_schema()
            .enumeration("stop_mode", "soft (ACPI shutdown) or hard", &["soft", "hard"], false)
            .string("comment", "Comment for the event log", false),
        |tb, ctx, params| async move {
            let system_id = required_str(&params, "system_id")?;
            let request: PowerOffRequest = parse_args(params)?;
            tb.call(&ctx, || tb.backend().power_off(&system_id, &request)).await
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
    async fn test_list_machines_with_filters() {
        let d = dispatcher(Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry());

        let all = call(&d, "list_machines", json!({})).await.unwrap();
        assert_eq!(all.as_array().unwrap().len(), 3);

        let ready = call(&d, "list_machines", json!({"status": "ready", "limit": "1"})).await.unwrap();
        assert_eq!(ready.as_array().unwrap().len(), 1);
        assert_eq!(ready[0]["hostname"], "node-01");

        let tagged = call(&d, "list_machines", json!({"tags": "virtual"})).await.unwrap();
        assert_eq!(tagged.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_through_tools() {
        let d = dispatcher(Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry());

        let machine = call(&d, "allocate_machine", json!({"min_cpu_count": 16})).await.unwrap();
        assert_eq!(machine["system_id"], "8k2m4p");
        assert_eq!(machine["status_name"], "Allocated");

        let machine = call(&d, "deploy_machine", json!({"system_id": "8k2m4p", "distro_series": "noble"}))
            .await
            .unwrap();
        assert_eq!(machine["distro_series"], "noble");

        let power = call(&d, "get_machine_power_state", json!({"system_id": "8k2m4p"})).await.unwrap();
        assert_eq!(power, json!({"system_id": "8k2m4p", "power_state": "on"}));

        call(&d, "power_off_machine", json!({"system_id": "8k2m4p", "stop_mode": "hard"})).await.unwrap();
        let machine = call(&d, "release_machine", json!({"system_id": "8k2m4p", "erase": "false"})).await.unwrap();
        assert_eq!(machine["status_name"], "Ready");
    }

    #[tokio::test]
    async fn test_missing_system_id() {
        let d = dispatcher(Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry());
        let err = call(&d, "power_on_machine", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "missing required field 'system_id'");
    }

    #[tokio::test]
    async fn test_invalid_stop_mode() {
        let d = dispatcher(Arc::new(MemoryBackend::seeded()), RetryPolicy::no_retry());
        let err = call(&d, "power_off_machine", json!({"system_id": "4y3h7n", "stop_mode": "gentle"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("stop_mode"));
    }
}

//! Network topology tools.

use super::{parse_args, required_i64, Toolbox};
use crate::maas::SubnetFilter;
use crate::mcp::{MCPToolInputSchema, Registry, RegistryError};

pub(super) fn register(registry: &mut Registry, toolbox: &Toolbox) -> Result<(), RegistryError> {
    registry.register_tool(toolbox.tool(
        "list_subnets",
        "List subnets, optionally restricted to one VLAN or fabric",
        MCPToolInputSchema::object()
            .integer("vlan_id", "Only subnets on this VLAN", false)
            .integer("fabric_id", "Only subnets on this fabric", false),
        |tb, ctx, params| async move {
            let filter: SubnetFilter = parse_args(params)?;
            tb.call(&ctx, || tb.backend().list_subnets(&filter)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "get_subnet_details",
        "Get one subnet, including its VLAN, gateway and DNS servers",
        MCPToolInputSchema::object().integer("id", "Subnet ID", true),
        |tb, ctx, params| async move {
            let id = required_i64(&params, "id")?;
            tb.call(&ctx, || tb.backend().get_subnet(id)).await
        },
    ))?;

    registry.register_tool(toolbox.tool(
        "list_fabrics",
        "List fabrics and their VLANs",
        MCPToolInputSchema::object(),
        |tb, ctx, _params| async move { tb.call(&ctx, || tb.backend().list_fabrics()).await },
    ))?;

    registry.register_tool(toolbox.tool(
        "list_vlans",
        "List the VLANs of a fabric",
        MCPToolInputSchema::object().integer("fabric_id", "Fabric ID", true),
        |tb, ctx, params| async move {
            let fabric_id = required_i64(&params, "fabric_id")?;
            tb.call(&ctx, || tb.backend().list_vlans(fabric_id)).await
        },
    ))?;

    Ok(())
}

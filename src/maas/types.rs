//! MAAS entity types.
//!
//! Only the fields the bridge filters or reports on are typed; everything
//! else the API returns is kept in `extra` and passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to a named MAAS object (zone, pool, domain).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NamedRef {
    /// Object ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Object name
    #[serde(default)]
    pub name: String,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NamedRef {
    /// Create a reference with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into(), extra: Map::new() }
    }
}

/// A MAAS machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// MAAS system ID (e.g. "4y3h7n")
    pub system_id: String,
    /// Hostname
    #[serde(default)]
    pub hostname: String,
    /// Lifecycle status ("Ready", "Allocated", "Deployed", ...)
    #[serde(default)]
    pub status_name: String,
    /// Power state ("on", "off", "unknown", "error")
    #[serde(default)]
    pub power_state: String,
    /// Architecture (e.g. "amd64/generic")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// CPU core count
    #[serde(default)]
    pub cpu_count: u32,
    /// Memory in MiB
    #[serde(default)]
    pub memory: u64,
    /// Deployed OS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osystem: Option<String>,
    /// Deployed release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distro_series: Option<String>,
    /// Availability zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<NamedRef>,
    /// Resource pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<NamedRef>,
    /// Tags applied to the machine
    #[serde(default)]
    pub tag_names: Vec<String>,
    /// Assigned IP addresses
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Machine {
    /// Create a machine with the given identity and empty details.
    pub fn new(system_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            hostname: hostname.into(),
            status_name: "New".to_string(),
            power_state: "unknown".to_string(),
            architecture: None,
            cpu_count: 0,
            memory: 0,
            osystem: None,
            distro_series: None,
            zone: None,
            pool: None,
            tag_names: Vec::new(),
            ip_addresses: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Zone name, if any.
    pub fn zone_name(&self) -> Option<&str> {
        self.zone.as_ref().map(|z| z.name.as_str())
    }

    /// Pool name, if any.
    pub fn pool_name(&self) -> Option<&str> {
        self.pool.as_ref().map(|p| p.name.as_str())
    }
}

/// Filters for listing machines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineFilter {
    /// Exact hostname
    pub hostname: Option<String>,
    /// Zone name
    pub zone: Option<String>,
    /// Resource pool name
    pub pool: Option<String>,
    /// Status name, case-insensitive
    pub status: Option<String>,
    /// Machines must carry all of these tags
    pub tags: Vec<String>,
    /// Number of matching machines to skip
    pub offset: Option<usize>,
    /// Maximum number of machines to return
    pub limit: Option<usize>,
}

impl MachineFilter {
    /// Whether a machine passes every filter except pagination.
    pub fn matches(&self, machine: &Machine) -> bool {
        self.hostname.as_deref().map_or(true, |h| machine.hostname == h)
            && self.zone.as_deref().map_or(true, |z| machine.zone_name() == Some(z))
            && self.pool.as_deref().map_or(true, |p| machine.pool_name() == Some(p))
            && self
                .status
                .as_deref()
                .map_or(true, |s| machine.status_name.eq_ignore_ascii_case(s))
            && self.tags.iter().all(|t| machine.tag_names.contains(t))
    }

    /// Filter and paginate a machine list.
    pub fn apply(&self, machines: Vec<Machine>) -> Vec<Machine> {
        machines
            .into_iter()
            .filter(|m| self.matches(m))
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Constraints for allocating a machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocateRequest {
    /// Hostname of a specific machine
    pub name: Option<String>,
    /// Minimum CPU cores
    pub min_cpu_count: Option<u32>,
    /// Minimum memory in MiB
    pub min_memory: Option<u64>,
    /// Required tags
    pub tags: Vec<String>,
    /// Zone name
    pub zone: Option<String>,
    /// Resource pool name
    pub pool: Option<String>,
    /// Architecture
    pub arch: Option<String>,
    /// Event log comment
    pub comment: Option<String>,
}

impl AllocateRequest {
    /// Whether a machine satisfies the constraints.
    pub fn accepts(&self, machine: &Machine) -> bool {
        self.name.as_deref().map_or(true, |n| machine.hostname == n)
            && self.min_cpu_count.map_or(true, |c| machine.cpu_count >= c)
            && self.min_memory.map_or(true, |m| machine.memory >= m)
            && self.tags.iter().all(|t| machine.tag_names.contains(t))
            && self.zone.as_deref().map_or(true, |z| machine.zone_name() == Some(z))
            && self.pool.as_deref().map_or(true, |p| machine.pool_name() == Some(p))
            && self
                .arch
                .as_deref()
                .map_or(true, |a| machine.architecture.as_deref().is_some_and(|m| m.starts_with(a)))
    }
}

/// Options for deploying an allocated machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployRequest {
    /// OS release (e.g. "jammy")
    pub distro_series: Option<String>,
    /// Hardware-enablement kernel
    pub hwe_kernel: Option<String>,
    /// Cloud-init user data
    pub user_data: Option<String>,
    /// Event log comment
    pub comment: Option<String>,
}

/// Options for releasing a machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseRequest {
    /// Erase disks on release
    pub erase: bool,
    /// Use quick erase
    pub quick_erase: bool,
    /// Event log comment
    pub comment: Option<String>,
}

/// Options for powering a machine off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerOffRequest {
    /// "soft" or "hard"
    pub stop_mode: Option<String>,
    /// Event log comment
    pub comment: Option<String>,
}

/// Result of a power state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    /// "on", "off", "unknown" or "error"
    pub state: String,
}

/// A VLAN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vlan {
    /// VLAN ID
    pub id: i64,
    /// 802.1Q tag
    #[serde(default)]
    pub vid: u16,
    /// VLAN name
    #[serde(default)]
    pub name: String,
    /// Owning fabric
    #[serde(default)]
    pub fabric_id: i64,
    /// MTU
    #[serde(default)]
    pub mtu: u32,
    /// Whether MAAS serves DHCP on this VLAN
    #[serde(default)]
    pub dhcp_on: bool,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A fabric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fabric {
    /// Fabric ID
    pub id: i64,
    /// Fabric name
    #[serde(default)]
    pub name: String,
    /// VLANs on this fabric
    #[serde(default)]
    pub vlans: Vec<Vlan>,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A subnet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet ID
    pub id: i64,
    /// Subnet name
    #[serde(default)]
    pub name: String,
    /// CIDR (e.g. "10.0.0.0/24")
    #[serde(default)]
    pub cidr: String,
    /// VLAN the subnet lives on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<Vlan>,
    /// Default gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    /// DNS servers
    #[serde(default)]
    pub dns_servers: Vec<String>,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Filters for listing subnets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetFilter {
    /// VLAN ID
    pub vlan_id: Option<i64>,
    /// Fabric ID
    pub fabric_id: Option<i64>,
}

impl SubnetFilter {
    /// Whether a subnet passes the filter.
    pub fn matches(&self, subnet: &Subnet) -> bool {
        let vlan = subnet.vlan.as_ref();
        self.vlan_id.map_or(true, |id| vlan.is_some_and(|v| v.id == id))
            && self.fabric_id.map_or(true, |id| vlan.is_some_and(|v| v.fabric_id == id))
    }
}

/// A tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name
    pub name: String,
    /// XPath definition for automatic tags
    #[serde(default)]
    pub definition: String,
    /// Free-form comment
    #[serde(default)]
    pub comment: String,
    /// Kernel options applied to tagged machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_opts: Option<String>,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters for creating a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTag {
    /// Tag name
    pub name: String,
    /// Free-form comment
    #[serde(default)]
    pub comment: Option<String>,
    /// XPath definition
    #[serde(default)]
    pub definition: Option<String>,
    /// Kernel options
    #[serde(default)]
    pub kernel_opts: Option<String>,
}

/// A block device attached to a machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Device ID
    pub id: i64,
    /// Device name (e.g. "sda")
    #[serde(default)]
    pub name: String,
    /// "physical" or "virtual"
    #[serde(rename = "type", default)]
    pub device_type: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Hardware model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Serial number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An LVM volume group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeGroup {
    /// Volume group ID
    pub id: i64,
    /// Volume group name
    #[serde(default)]
    pub name: String,
    /// Total size in bytes
    #[serde(default)]
    pub size: u64,
    /// Unallocated size in bytes
    #[serde(default)]
    pub available_size: u64,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A software RAID set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raid {
    /// RAID ID
    pub id: i64,
    /// RAID name (e.g. "md0")
    #[serde(default)]
    pub name: String,
    /// RAID level (e.g. "raid-1")
    #[serde(default)]
    pub level: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Untyped remainder of the API object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_fields_pass_through() {
        let raw = serde_json::json!({
            "system_id": "abc123",
            "hostname": "node",
            "zone": {"id": 1, "name": "default", "description": "", "resource_uri": "/MAAS/api/2.0/zones/default/"}
        });
        let machine: Machine = serde_json::from_value(raw).unwrap();
        let zone = machine.zone.as_ref().unwrap();
        assert_eq!(zone.name, "default");
        assert_eq!(zone.extra["resource_uri"], "/MAAS/api/2.0/zones/default/");

        let back = serde_json::to_value(&machine).unwrap();
        assert_eq!(back["zone"]["description"], "");
    }

    fn machine(id: &str, host: &str, status: &str, tags: &[&str]) -> Machine {
        let mut m = Machine::new(id, host);
        m.status_name = status.to_string();
        m.tag_names = tags.iter().map(|t| (*t).to_string()).collect();
        m.zone = Some(NamedRef::named("default"));
        m
    }

    #[test]
    fn test_machine_deserialization_keeps_unknown_fields() {
        let json = serde_json::json!({
            "system_id": "abc123",
            "hostname": "node-1",
            "status_name": "Ready",
            "zone": {"id": 1, "name": "az1"},
            "boot_interface": {"mac_address": "52:54:00:00:00:01"}
        });

        let machine: Machine = serde_json::from_value(json).unwrap();
        assert_eq!(machine.zone_name(), Some("az1"));
        assert!(machine.extra.contains_key("boot_interface"));

        let back = serde_json::to_value(&machine).unwrap();
        assert_eq!(back["boot_interface"]["mac_address"], "52:54:00:00:00:01");
    }

    #[test]
    fn test_machine_filter() {
        let machines = vec![
            machine("a", "node-a", "Ready", &["gpu"]),
            machine("b", "node-b", "Deployed", &["gpu", "ssd"]),
            machine("c", "node-c", "ready", &[]),
        ];

        let ready = MachineFilter { status: Some("READY".into()), ..Default::default() };
        assert_eq!(ready.apply(machines.clone()).len(), 2);

        let tagged = MachineFilter { tags: vec!["gpu".into(), "ssd".into()], ..Default::default() };
        let result = tagged.apply(machines.clone());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].system_id, "b");

        let page = MachineFilter { offset: Some(1), limit: Some(1), ..Default::default() };
        let result = page.apply(machines);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].system_id, "b");
    }

    #[test]
    fn test_allocate_constraints() {
        let mut m = machine("a", "node-a", "Ready", &["gpu"]);
        m.cpu_count = 8;
        m.memory = 16384;
        m.architecture = Some("amd64/generic".into());

        assert!(AllocateRequest::default().accepts(&m));
        assert!(AllocateRequest { min_cpu_count: Some(8), arch: Some("amd64".into()), ..Default::default() }
            .accepts(&m));
        assert!(!AllocateRequest { min_memory: Some(32768), ..Default::default() }.accepts(&m));
        assert!(!AllocateRequest { tags: vec!["ssd".into()], ..Default::default() }.accepts(&m));
    }

    #[test]
    fn test_subnet_filter() {
        let subnet: Subnet = serde_json::from_value(serde_json::json!({
            "id": 1,
            "cidr": "10.0.0.0/24",
            "vlan": {"id": 5001, "vid": 0, "fabric_id": 0}
        }))
        .unwrap();

        assert!(SubnetFilter::default().matches(&subnet));
        assert!(SubnetFilter { vlan_id: Some(5001), fabric_id: Some(0) }.matches(&subnet));
        assert!(!SubnetFilter { fabric_id: Some(1), ..Default::default() }.matches(&subnet));
    }
}

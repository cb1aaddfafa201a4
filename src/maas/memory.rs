//! In-memory backend.
//!
//! Implements every capability trait over seeded, deterministic data so the
//! server can run without a MAAS region controller (`--backend memory`) and
//! so dispatcher tests have a predictable upstream. Transient upstream
//! failures can be injected with [`MemoryBackend::fail_next`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::client::{
    BackendError, BackendResult, MachineClient, NetworkClient, RaidClient, StorageClient,
    TagClient, VolumeGroupClient,
};
use super::types::{
    AllocateRequest, BlockDevice, DeployRequest, Fabric, Machine, MachineFilter, NamedRef,
    NewTag, PowerOffRequest, PowerState, Raid, ReleaseRequest, Subnet, SubnetFilter, Tag,
    VolumeGroup, Vlan,
};

#[derive(Debug, Default)]
struct State {
    machines: Vec<Machine>,
    fabrics: Vec<Fabric>,
    subnets: Vec<Subnet>,
    tags: Vec<Tag>,
    block_devices: HashMap<String, Vec<BlockDevice>>,
    volume_groups: HashMap<String, Vec<VolumeGroup>>,
    raids: HashMap<String, Vec<Raid>>,
}

/// In-memory MAAS stand-in.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    calls: AtomicUsize,
    pending_failures: AtomicUsize,
}

impl MemoryBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with a small fixed inventory: three machines, one fabric
    /// with two VLANs, two subnets and two tags.
    pub fn seeded() -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.write();

            let vlan = |id, vid, name: &str| Vlan {
                id,
                vid,
                name: name.to_string(),
                fabric_id: 0,
                mtu: 1500,
                dhcp_on: vid == 0,
                extra: Default::default(),
            };
            let untagged = vlan(5001, 0, "untagged");
            let storage = vlan(5002, 100, "storage");

            state.fabrics.push(Fabric {
                id: 0,
                name: "fabric-0".to_string(),
                vlans: vec![untagged.clone(), storage.clone()],
                extra: Default::default(),
            });

            state.subnets.push(Subnet {
                id: 1,
                name: "10.10.0.0/24".to_string(),
                cidr: "10.10.0.0/24".to_string(),
                vlan: Some(untagged),
                gateway_ip: Some("10.10.0.1".to_string()),
                dns_servers: vec!["10.10.0.2".to_string()],
                extra: Default::default(),
            });
            state.subnets.push(Subnet {
                id: 2,
                name: "10.20.0.0/24".to_string(),
                cidr: "10.20.0.0/24".to_string(),
                vlan: Some(storage),
                gateway_ip: None,
                dns_servers: Vec::new(),
                extra: Default::default(),
            });

            for (system_id, hostname, status, power, cpus, memory, tags) in [
                ("4y3h7n", "node-01", "Ready", "off", 8, 16_384, vec!["virtual"]),
                ("8k2m4p", "node-02", "Ready", "off", 32, 131_072, vec!["gpu"]),
                ("x7q9rt", "node-03", "Deployed", "on", 16, 65_536, vec!["virtual"]),
            ] {
                let mut machine = Machine::new(system_id, hostname);
                machine.status_name = status.to_string();
                machine.power_state = power.to_string();
                machine.cpu_count = cpus;
                machine.memory = memory;
                machine.architecture = Some("amd64/generic".to_string());
                machine.zone = Some(NamedRef { id: Some(1), ..NamedRef::named("default") });
                machine.pool = Some(NamedRef { id: Some(0), ..NamedRef::named("default") });
                machine.tag_names = tags.into_iter().map(String::from).collect();
                if status == "Deployed" {
                    machine.osystem = Some("ubuntu".to_string());
                    machine.distro_series = Some("jammy".to_string());
                    machine.ip_addresses = vec!["10.10.0.13".to_string()];
                }

                state.block_devices.insert(
                    system_id.to_string(),
                    vec![BlockDevice {
                        id: 1,
                        name: "sda".to_string(),
                        device_type: "physical".to_string(),
                        size: 500_107_862_016,
                        model: Some("QEMU HARDDISK".to_string()),
                        serial: Some(format!("QM-{system_id}")),
                        extra: Default::default(),
                    }],
                );
                state.machines.push(machine);
            }

            state.volume_groups.insert(
                "x7q9rt".to_string(),
                vec![VolumeGroup {
                    id: 1,
                    name: "vgroot".to_string(),
                    size: 499_000_000_000,
                    available_size: 0,
                    extra: Default::default(),
                }],
            );
            state.raids.insert("x7q9rt".to_string(), Vec::new());

            for (name, comment) in [("virtual", "Virtual machines"), ("gpu", "Has a GPU")] {
                state.tags.push(Tag {
                    name: name.to_string(),
                    definition: String::new(),
                    comment: comment.to_string(),
                    kernel_opts: None,
                    extra: Default::default(),
                });
            }
        }
        backend
    }

    /// Add a machine.
    pub fn insert_machine(&self, machine: Machine) {
        self.state.write().machines.push(machine);
    }

    /// Make the next `count` backend calls fail with HTTP 503.
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of backend calls made so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(BackendError::Status {
                status: 503,
                body: "service temporarily unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn with_machine<T>(
        &self,
        system_id: &str,
        f: impl FnOnce(&mut Machine) -> BackendResult<T>,
    ) -> BackendResult<T> {
        self.enter()?;
        let mut state = self.state.write();
        let machine = state
            .machines
            .iter_mut()
            .find(|m| m.system_id == system_id)
            .ok_or_else(|| BackendError::NotFound(format!("machine {system_id}")))?;
        f(machine)
    }

    fn machine_exists(&self, system_id: &str) -> BackendResult<()> {
        if self.state.read().machines.iter().any(|m| m.system_id == system_id) {
            Ok(())
        } else {
            Err(BackendError::NotFound(format!("machine {system_id}")))
        }
    }
}

fn conflict(machine: &Machine, action: &str) -> BackendError {
    BackendError::Status {
        status: 409,
        body: format!(
            "cannot {action} machine {} in state {}",
            machine.system_id, machine.status_name
        ),
    }
}

#[async_trait]
impl MachineClient for MemoryBackend {
    async fn list_machines(&self, filter: &MachineFilter) -> BackendResult<Vec<Machine>> {
        self.enter()?;
        Ok(filter.apply(self.state.read().machines.clone()))
    }

    async fn get_machine(&self, system_id: &str) -> BackendResult<Machine> {
        self.with_machine(system_id, |m| Ok(m.clone()))
    }

    async fn allocate_machine(&self, request: &AllocateRequest) -> BackendResult<Machine> {
        self.enter()?;
        let mut state = self.state.write();
        let machine = state
            .machines
            .iter_mut()
            .find(|m| m.status_name == "Ready" && request.accepts(m))
            .ok_or_else(|| {
                BackendError::NotFound("no machine matches the constraints".to_string())
            })?;
        machine.status_name = "Allocated".to_string();
        Ok(machine.clone())
    }

    async fn deploy_machine(&self, system_id: &str, request: &DeployRequest) -> BackendResult<Machine> {
        self.with_machine(system_id, |m| {
            if m.status_name != "Allocated" {
                return Err(conflict(m, "deploy"));
            }
            m.status_name = "Deploying".to_string();
            m.power_state = "on".to_string();
            m.osystem = Some("ubuntu".to_string());
            m.distro_series =
                Some(request.distro_series.clone().unwrap_or_else(|| "jammy".to_string()));
            Ok(m.clone())
        })
    }

    async fn release_machine(&self, system_id: &str, _request: &ReleaseRequest) -> BackendResult<Machine> {
        self.with_machine(system_id, |m| {
            if m.status_name == "Ready" {
                return Err(conflict(m, "release"));
            }
            m.status_name = "Ready".to_string();
            m.power_state = "off".to_string();
            m.osystem = None;
            m.distro_series = None;
            Ok(m.clone())
        })
    }

    async fn power_state(&self, system_id: &str) -> BackendResult<PowerState> {
        self.with_machine(system_id, |m| Ok(PowerState { state: m.power_state.clone() }))
    }

    async fn power_on(&self, system_id: &str, _comment: Option<&str>) -> BackendResult<Machine> {
        self.with_machine(system_id, |m| {
            m.power_state = "on".to_string();
            Ok(m.clone())
        })
    }

    async fn power_off(&self, system_id: &str, _request: &PowerOffRequest) -> BackendResult<Machine> {
        self.with_machine(system_id, |m| {
            m.power_state = "off".to_string();
            Ok(m.clone())
        })
    }
}

#[async_trait]
impl NetworkClient for MemoryBackend {
    async fn list_subnets(&self, filter: &SubnetFilter) -> BackendResult<Vec<Subnet>> {
        self.enter()?;
        Ok(self.state.read().subnets.iter().filter(|s| filter.matches(s)).cloned().collect())
    }

    async fn get_subnet(&self, id: i64) -> BackendResult<Subnet> {
        self.enter()?;
        self.state
            .read()
            .subnets
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("subnet {id}")))
    }

    async fn list_fabrics(&self) -> BackendResult<Vec<Fabric>> {
        self.enter()?;
        Ok(self.state.read().fabrics.clone())
    }

    async fn list_vlans(&self, fabric_id: i64) -> BackendResult<Vec<Vlan>> {
        self.enter()?;
        self.state
            .read()
            .fabrics
            .iter()
            .find(|f| f.id == fabric_id)
            .map(|f| f.vlans.clone())
            .ok_or_else(|| BackendError::NotFound(format!("fabric {fabric_id}")))
    }
}

#[async_trait]
impl TagClient for MemoryBackend {
    async fn list_tags(&self) -> BackendResult<Vec<Tag>> {
        self.enter()?;
        Ok(self.state.read().tags.clone())
    }

    async fn get_tag(&self, name: &str) -> BackendResult<Tag> {
        self.enter()?;
        self.state
            .read()
            .tags
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("tag {name}")))
    }

    async fn create_tag(&self, tag: &NewTag) -> BackendResult<Tag> {
        self.enter()?;
        let mut state = self.state.write();
        if state.tags.iter().any(|t| t.name == tag.name) {
            return Err(BackendError::InvalidRequest(format!("tag {} already exists", tag.name)));
        }
        let created = Tag {
            name: tag.name.clone(),
            definition: tag.definition.clone().unwrap_or_default(),
            comment: tag.comment.clone().unwrap_or_default(),
            kernel_opts: tag.kernel_opts.clone(),
            extra: Default::default(),
        };
        state.tags.push(created.clone());
        Ok(created)
    }

    async fn add_tag_to_machines(&self, tag: &str, system_ids: &[String]) -> BackendResult<()> {
        self.enter()?;
        let mut state = self.state.write();
        if !state.tags.iter().any(|t| t.name == tag) {
            return Err(BackendError::NotFound(format!("tag {tag}")));
        }
        for machine in state.machines.iter_mut().filter(|m| system_ids.contains(&m.system_id)) {
            if !machine.tag_names.iter().any(|t| t == tag) {
                machine.tag_names.push(tag.to_string());
            }
        }
        Ok(())
    }

    async fn remove_tag_from_machines(&self, tag: &str, system_ids: &[String]) -> BackendResult<()> {
        self.enter()?;
        let mut state = self.state.write();
        if !state.tags.iter().any(|t| t.name == tag) {
            return Err(BackendError::NotFound(format!("tag {tag}")));
        }
        for machine in state.machines.iter_mut().filter(|m| system_ids.contains(&m.system_id)) {
            machine.tag_names.retain(|t| t != tag);
        }
        Ok(())
    }

    async fn tagged_machines(&self, tag: &str) -> BackendResult<Vec<Machine>> {
        self.enter()?;
        let state = self.state.read();
        if !state.tags.iter().any(|t| t.name == tag) {
            return Err(BackendError::NotFound(format!("tag {tag}")));
        }
        Ok(state.machines.iter().filter(|m| m.tag_names.iter().any(|t| t == tag)).cloned().collect())
    }
}

#[async_trait]
impl StorageClient for MemoryBackend {
    async fn list_block_devices(&self, system_id: &str) -> BackendResult<Vec<BlockDevice>> {
        self.enter()?;
        self.machine_exists(system_id)?;
        Ok(self.state.read().block_devices.get(system_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl VolumeGroupClient for MemoryBackend {
    async fn list_volume_groups(&self, system_id: &str) -> BackendResult<Vec<VolumeGroup>> {
        self.enter()?;
        self.machine_exists(system_id)?;
        Ok(self.state.read().volume_groups.get(system_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl RaidClient for MemoryBackend {
    async fn list_raids(&self, system_id: &str) -> BackendResult<Vec<Raid>> {
        self.enter()?;
        self.machine_exists(system_id)?;
        Ok(self.state.read().raids.get(system_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_inventory() {
        let backend = MemoryBackend::seeded();

        let machines = backend.list_machines(&MachineFilter::default()).await.unwrap();
        assert_eq!(machines.len(), 3);
        assert_eq!(backend.list_subnets(&SubnetFilter::default()).await.unwrap().len(), 2);
        assert_eq!(backend.list_vlans(0).await.unwrap().len(), 2);
        assert_eq!(backend.list_tags().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_machine_lifecycle() {
        let backend = MemoryBackend::seeded();

        let allocated = backend
            .allocate_machine(&AllocateRequest { tags: vec!["gpu".into()], ..Default::default() })
            .await
            .unwrap();
        assert_eq!(allocated.system_id, "8k2m4p");
        assert_eq!(allocated.status_name, "Allocated");

        let deployed = backend
            .deploy_machine("8k2m4p", &DeployRequest { distro_series: Some("noble".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(deployed.status_name, "Deploying");
        assert_eq!(deployed.distro_series.as_deref(), Some("noble"));

        let released = backend.release_machine("8k2m4p", &ReleaseRequest::default()).await.unwrap();
        assert_eq!(released.status_name, "Ready");
    }

    #[tokio::test]
    async fn test_deploy_requires_allocation() {
        let backend = MemoryBackend::seeded();
        let err = backend.deploy_machine("4y3h7n", &DeployRequest::default()).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_unknown_machine_is_not_found() {
        let backend = MemoryBackend::seeded();
        let err = backend.get_machine("missing").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
        assert!(backend.list_block_devices("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_power_toggle() {
        let backend = MemoryBackend::seeded();
        backend.power_on("4y3h7n", None).await.unwrap();
        assert_eq!(backend.power_state("4y3h7n").await.unwrap().state, "on");
        backend.power_off("4y3h7n", &PowerOffRequest::default()).await.unwrap();
        assert_eq!(backend.power_state("4y3h7n").await.unwrap().state, "off");
    }

    #[tokio::test]
    async fn test_tags() {
        let backend = MemoryBackend::seeded();
        backend.create_tag(&NewTag { name: "rack-a".into(), ..Default::default() }).await.unwrap();
        assert!(backend.create_tag(&NewTag { name: "rack-a".into(), ..Default::default() }).await.is_err());

        backend.add_tag_to_machines("rack-a", &["4y3h7n".into(), "x7q9rt".into()]).await.unwrap();
        assert_eq!(backend.tagged_machines("rack-a").await.unwrap().len(), 2);

        backend.remove_tag_from_machines("rack-a", &["4y3h7n".into()]).await.unwrap();
        let tagged = backend.tagged_machines("rack-a").await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].system_id, "x7q9rt");
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = MemoryBackend::seeded();
        backend.fail_next(2);

        assert!(backend.list_tags().await.is_err());
        assert!(backend.list_tags().await.is_err());
        assert!(backend.list_tags().await.is_ok());
        assert_eq!(backend.calls(), 3);
    }
}

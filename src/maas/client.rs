//! Backend capability traits.
//!
//! The dispatch layer only ever sees these traits. [`super::MaasClient`]
//! implements them against the MAAS REST API and [`super::MemoryBackend`]
//! against seeded in-memory data.

use async_trait::async_trait;

use super::types::{
    AllocateRequest, BlockDevice, DeployRequest, Fabric, Machine, MachineFilter, NewTag,
    PowerOffRequest, PowerState, Raid, ReleaseRequest, Subnet, SubnetFilter, Tag, VolumeGroup,
    Vlan,
};
use crate::core::Retryable;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("MAAS returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to decode MAAS response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend misconfigured: {0}")]
    Config(String),
}

impl Retryable for BackendError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_decode(),
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::NotFound(_) | Self::InvalidRequest(_) | Self::Decode(_) | Self::Config(_) => {
                false
            }
        }
    }
}

/// Machine lifecycle operations.
#[async_trait]
pub trait MachineClient: Send + Sync {
    /// List machines matching a filter.
    async fn list_machines(&self, filter: &MachineFilter) -> BackendResult<Vec<Machine>>;

    /// Fetch a single machine.
    async fn get_machine(&self, system_id: &str) -> BackendResult<Machine>;

    /// Allocate a ready machine matching the constraints.
    async fn allocate_machine(&self, request: &AllocateRequest) -> BackendResult<Machine>;

    /// Deploy an allocated machine.
    async fn deploy_machine(&self, system_id: &str, request: &DeployRequest)
        -> BackendResult<Machine>;

    /// Release a machine back to the pool.
    async fn release_machine(
        &self,
        system_id: &str,
        request: &ReleaseRequest,
    ) -> BackendResult<Machine>;

    /// Query the BMC for the current power state.
    async fn power_state(&self, system_id: &str) -> BackendResult<PowerState>;

    /// Power a machine on.
    async fn power_on(&self, system_id: &str, comment: Option<&str>) -> BackendResult<Machine>;

    /// Power a machine off.
    async fn power_off(&self, system_id: &str, request: &PowerOffRequest)
        -> BackendResult<Machine>;
}

/// Network topology queries.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// List subnets.
    async fn list_subnets(&self, filter: &SubnetFilter) -> BackendResult<Vec<Subnet>>;

    /// Fetch a single subnet.
    async fn get_subnet(&self, id: i64) -> BackendResult<Subnet>;

    /// List fabrics.
    async fn list_fabrics(&self) -> BackendResult<Vec<Fabric>>;

    /// List the VLANs of a fabric.
    async fn list_vlans(&self, fabric_id: i64) -> BackendResult<Vec<Vlan>>;
}

/// Tag management.
#[async_trait]
pub trait TagClient: Send + Sync {
    /// List tags.
    async fn list_tags(&self) -> BackendResult<Vec<Tag>>;

    /// Fetch a single tag.
    async fn get_tag(&self, name: &str) -> BackendResult<Tag>;

    /// Create a tag.
    async fn create_tag(&self, tag: &NewTag) -> BackendResult<Tag>;

    /// Apply a tag to machines.
    async fn add_tag_to_machines(&self, tag: &str, system_ids: &[String]) -> BackendResult<()>;

    /// Remove a tag from machines.
    async fn remove_tag_from_machines(&self, tag: &str, system_ids: &[String])
        -> BackendResult<()>;

    /// List machines carrying a tag.
    async fn tagged_machines(&self, tag: &str) -> BackendResult<Vec<Machine>>;
}

/// Block device queries.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// List the block devices of a machine.
    async fn list_block_devices(&self, system_id: &str) -> BackendResult<Vec<BlockDevice>>;
}

/// Volume group queries.
#[async_trait]
pub trait VolumeGroupClient: Send + Sync {
    /// List the volume groups of a machine.
    async fn list_volume_groups(&self, system_id: &str) -> BackendResult<Vec<VolumeGroup>>;
}

/// RAID queries.
#[async_trait]
pub trait RaidClient: Send + Sync {
    /// List the RAID sets of a machine.
    async fn list_raids(&self, system_id: &str) -> BackendResult<Vec<Raid>>;
}

/// Everything the tool handlers need from a backend.
pub trait BackendClient:
    MachineClient + NetworkClient + TagClient + StorageClient + VolumeGroupClient + RaidClient
{
}

impl<T> BackendClient for T where
    T: MachineClient + NetworkClient + TagClient + StorageClient + VolumeGroupClient + RaidClient
{
}

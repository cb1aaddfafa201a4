//! MAAS backend integration.
//!
//! The bridge depends on the backend only through the capability traits in
//! [`client`]; the concrete REST client and the in-memory stand-in are
//! interchangeable behind `Arc<dyn BackendClient>`.

mod client;
mod http;
mod memory;
mod types;

use std::sync::Arc;

pub use client::{
    BackendClient, BackendError, BackendResult, MachineClient, NetworkClient, RaidClient,
    StorageClient, TagClient, VolumeGroupClient,
};
pub use http::MaasClient;
pub use memory::MemoryBackend;
pub use types::{
    AllocateRequest, BlockDevice, DeployRequest, Fabric, Machine, MachineFilter, NamedRef,
    NewTag, PowerOffRequest, PowerState, Raid, ReleaseRequest, Subnet, SubnetFilter, Tag,
    VolumeGroup, Vlan,
};

use crate::core::{BackendKind, MaasConfig};

/// Construct the configured backend.
pub fn build_backend(config: &MaasConfig) -> BackendResult<Arc<dyn BackendClient>> {
    match config.backend {
        BackendKind::Http => Ok(Arc::new(MaasClient::from_config(config)?)),
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::seeded())),
    }
}

//! Capability interfaces for the external systems a rotation drives.
//!
//! Each collaborator is a narrow trait so tests can substitute them
//! independently:
//! - [`Inventory`]: live instances of a compute resource
//! - [`Lifecycle`]: per-instance deallocate / update / reimage / start
//! - [`ScaleSets`]: whole-resource operations
//! - [`WorkloadPlatform`]: drain and readiness of a node
//! - [`BackupStore`]: point-in-time control-plane backups
//!
//! Every call may block for seconds to minutes; callers race them against
//! a [`crate::cancel::Cancellation`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pool::{InstanceHandle, NodeIdentity, VmInstance};

/// Enumerates the live instances of a compute resource.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn list_instances(&self, scale_set: &str) -> Result<Vec<VmInstance>>;
}

/// Lifecycle operations on a single instance, addressed by handle.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Stop the instance, releasing compute but keeping disk and identity.
    async fn deallocate(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()>;

    /// Apply the scale set's current model to this instance.
    async fn update_model(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()>;

    /// Reset the instance to the base image. The instance must be stopped.
    async fn reimage(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()>;

    async fn start(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()>;
}

/// Operations on a whole compute resource.
#[async_trait]
pub trait ScaleSets: Send + Sync {
    async fn delete(&self, scale_set: &str) -> Result<()>;
}

/// The orchestration platform running on the nodes.
#[async_trait]
pub trait WorkloadPlatform: Send + Sync {
    /// Evict scheduled workload from the node.
    async fn drain(&self, node: &NodeIdentity) -> Result<()>;

    /// Single readiness probe; the caller owns polling and the time bound.
    async fn is_ready(&self, node: &NodeIdentity) -> Result<bool>;
}

/// A point-in-time backup artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

/// Read-only view of the backup store.
#[async_trait]
pub trait BackupStore: Send + Sync {
    async fn list_backups(&self) -> Result<Vec<BackupDescriptor>>;
}

//! Node pool model.
//!
//! Pools are produced and validated elsewhere; this crate only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of the compute resource (scale set) backing a pool.
const SCALE_SET_PREFIX: &str = "ss-";

/// Role shared by every node of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolRole {
    /// Control plane (quorum sensitive).
    Master,
    Infra,
    Compute,
}

impl PoolRole {
    pub fn is_control_plane(&self) -> bool {
        matches!(self, Self::Master)
    }
}

/// Marketplace image tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

/// Overrides used by test clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOverrides {
    /// Resource group holding a custom image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_resource_group: Option<String>,

    /// Custom image replacing the marketplace image when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_resource_name: Option<String>,
}

/// A named group of nodes sharing a role and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub role: PoolRole,
    pub count: u32,
    pub vm_size: String,
    pub image: ImageReference,
    /// Rendered startup procedure.
    pub startup_script: String,
    #[serde(default)]
    pub test_overrides: TestOverrides,
}

impl Pool {
    /// Name of the compute resource backing this pool.
    pub fn scale_set_name(&self) -> String {
        scale_set_name(&self.name)
    }

    /// Image the pool's instances are built from, after test overrides.
    ///
    /// A custom image needs both its resource group and name; with either
    /// missing the marketplace image is used.
    pub fn effective_image(&self) -> EffectiveImage {
        let overrides = &self.test_overrides;
        match (&overrides.image_resource_group, &overrides.image_resource_name) {
            (Some(group), Some(name)) if !group.is_empty() && !name.is_empty() => {
                EffectiveImage::Custom {
                    id: format!(
                        "/resourceGroups/{group}/providers/Microsoft.Compute/images/{name}"
                    ),
                }
            }
            _ => EffectiveImage::Marketplace(self.image.clone()),
        }
    }
}

/// Name of the compute resource backing the pool called `pool_name`.
pub fn scale_set_name(pool_name: &str) -> String {
    format!("{SCALE_SET_PREFIX}{pool_name}")
}

/// The image actually applied to a pool's instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveImage {
    Marketplace(ImageReference),
    Custom { id: String },
}

/// Stable logical name of a cluster member, e.g. `master-000001`.
///
/// Normalised to lowercase so the same host always maps to one ledger key,
/// including keys read back from a stored ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeIdentity(String);

impl NodeIdentity {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this node was provisioned by the pool `pool_name`.
    pub fn belongs_to(&self, pool_name: &str) -> bool {
        self.0
            .strip_prefix(&pool_name.to_lowercase())
            .is_some_and(|rest| rest.starts_with('-'))
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeIdentity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<NodeIdentity> for String {
    fn from(identity: NodeIdentity) -> Self {
        identity.0
    }
}

/// Opaque provider handle used to address lifecycle calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceHandle(String);

impl InstanceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live instance of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInstance {
    pub identity: NodeIdentity,
    pub handle: InstanceHandle,
}

impl VmInstance {
    pub fn new(identity: impl AsRef<str>, handle: impl Into<String>) -> Self {
        Self {
            identity: NodeIdentity::new(identity),
            handle: InstanceHandle::new(handle),
        }
    }
}

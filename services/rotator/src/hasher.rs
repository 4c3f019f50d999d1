//! Desired-configuration fingerprints for pools.
//!
//! The fingerprint is the only signal used to decide whether a node needs
//! to be rotated. It covers exactly what changes a node's disk and boot:
//! VM class, effective image, rendered startup content, and test overrides.
//! Pool size and name are not part of it: scaling a pool never rotates its
//! existing nodes.

use rotor_reconcile::{Fingerprint, FingerprintError};
use serde::Serialize;

use crate::pool::{EffectiveImage, Pool, TestOverrides};

/// Computes the desired fingerprint of a pool.
pub trait PoolHasher: Send + Sync {
    fn hash_pool(&self, pool: &Pool) -> Result<Fingerprint, FingerprintError>;
}

/// The per-instance model of a scale set, as far as it affects a node.
#[derive(Debug, Serialize)]
pub struct ScaleSetModel<'a> {
    pub vm_size: &'a str,
    pub image: EffectiveImage,
    pub startup_script: &'a str,
    pub test_overrides: &'a TestOverrides,
}

impl<'a> ScaleSetModel<'a> {
    pub fn from_pool(pool: &'a Pool) -> Self {
        Self {
            vm_size: &pool.vm_size,
            image: pool.effective_image(),
            startup_script: &pool.startup_script,
            test_overrides: &pool.test_overrides,
        }
    }
}

/// Default hasher: SHA-256 over the canonical JSON of [`ScaleSetModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleSetHasher;

impl PoolHasher for ScaleSetHasher {
    fn hash_pool(&self, pool: &Pool) -> Result<Fingerprint, FingerprintError> {
        Fingerprint::of(&ScaleSetModel::from_pool(pool))
    }
}

//! Convergence ledger: the durable record of which configuration each node
//! last converged to.
//!
//! The ledger is one document mapping node identity to fingerprint. Stores
//! read and replace the whole document; there are no partial updates and no
//! merging, so only one writer may be active per cluster at a time.
//!
//! Three stores are provided:
//! - [`FileLedgerStore`]: local JSON file, atomic replace
//! - [`BlobLedgerStore`]: JSON blob in object storage over HTTP
//! - [`MemoryLedgerStore`]: in-memory document for tests

mod blob;
mod file;
mod memory;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rotor_reconcile::Fingerprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::NodeIdentity;

pub use blob::BlobLedgerStore;
pub use file::FileLedgerStore;
pub use memory::MemoryLedgerStore;

/// Errors from ledger stores.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger document is invalid: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("ledger request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Mapping of node identity to last-committed fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConvergenceLedger {
    entries: BTreeMap<NodeIdentity, Fingerprint>,
}

impl ConvergenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &NodeIdentity) -> Option<&Fingerprint> {
        self.entries.get(node)
    }

    /// Returns true if `node` last converged to `desired`.
    pub fn is_converged(&self, node: &NodeIdentity, desired: &Fingerprint) -> bool {
        self.entries.get(node) == Some(desired)
    }

    /// Record that `node` converged to `fingerprint`.
    pub fn record(&mut self, node: NodeIdentity, fingerprint: Fingerprint) {
        self.entries.insert(node, fingerprint);
    }

    /// Remove every entry belonging to the pool `pool_name`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_pool(&mut self, pool_name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|node, _| !node.belongs_to(pool_name));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeIdentity, &Fingerprint)> {
        self.entries.iter()
    }
}

impl FromIterator<(NodeIdentity, Fingerprint)> for ConvergenceLedger {
    fn from_iter<I: IntoIterator<Item = (NodeIdentity, Fingerprint)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Whole-document ledger persistence.
///
/// An uninitialised store reads as an empty ledger, never as an error.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Load the entire ledger.
    async fn read(&self) -> Result<ConvergenceLedger, LedgerError>;

    /// Replace the entire ledger.
    async fn write(&self, ledger: &ConvergenceLedger) -> Result<(), LedgerError>;
}

/// Where the ledger document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerLocation {
    File(PathBuf),
    Blob(String),
}

/// Open the store for a ledger location.
pub fn open(location: &LedgerLocation) -> Result<Arc<dyn LedgerStore>, LedgerError> {
    Ok(match location {
        LedgerLocation::File(path) => Arc::new(FileLedgerStore::new(path.clone())),
        LedgerLocation::Blob(url) => Arc::new(BlobLedgerStore::new(url.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_reconcile::FINGERPRINT_LEN;

    fn fp(b: u8) -> Fingerprint {
        Fingerprint::from_bytes([b; FINGERPRINT_LEN])
    }

    #[test]
    fn test_json_is_object_of_hex_strings() {
        let ledger: ConvergenceLedger = [(NodeIdentity::new("master-0"), fp(0x01))]
            .into_iter()
            .collect();

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json, serde_json::json!({ "master-0": "01".repeat(FINGERPRINT_LEN) }));

        let parsed: ConvergenceLedger = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, ledger);
    }

    #[test]
    fn test_remove_pool_only_touches_that_pool() {
        let mut ledger: ConvergenceLedger = [
            (NodeIdentity::new("master-0"), fp(1)),
            (NodeIdentity::new("master-1"), fp(1)),
            (NodeIdentity::new("infra-0"), fp(2)),
            (NodeIdentity::new("mycompute-0"), fp(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(ledger.remove_pool("master"), 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(&NodeIdentity::new("infra-0")), Some(&fp(2)));
        assert_eq!(ledger.get(&NodeIdentity::new("mycompute-0")), Some(&fp(3)));
    }

    #[test]
    fn test_is_converged() {
        let mut ledger = ConvergenceLedger::new();
        let node = NodeIdentity::new("master-000000");
        assert!(!ledger.is_converged(&node, &fp(9)));

        ledger.record(node.clone(), fp(9));
        assert!(ledger.is_converged(&node, &fp(9)));
        assert!(!ledger.is_converged(&node, &fp(8)));
    }

    #[test]
    fn test_stored_keys_are_normalised() {
        let mut ledger: ConvergenceLedger = serde_json::from_value(serde_json::json!({
            "Master-000000": fp(1).to_hex(),
            "infra-0": fp(2).to_hex(),
        }))
        .unwrap();

        assert!(ledger.is_converged(&NodeIdentity::new("master-000000"), &fp(1)));
        assert_eq!(ledger.remove_pool("master"), 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(&NodeIdentity::new("infra-0")), Some(&fp(2)));
    }

    #[test]
    fn test_rejects_malformed_fingerprint() {
        let result: Result<ConvergenceLedger, _> =
            serde_json::from_value(serde_json::json!({ "master-0": "not-hex" }));
        assert!(result.is_err());
    }
}

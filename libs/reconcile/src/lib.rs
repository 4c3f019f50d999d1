//! Convergence primitives for node rotation.
//!
//! This library provides the pieces a rotation loop uses to decide whether a
//! node needs work at all:
//!
//! - **Fingerprint**: a deterministic hash of a pool's desired configuration.
//! - **Partitioning**: splitting live nodes into converged and stale sets by
//!   comparing their last-applied fingerprint with the desired one.
//!
//! # Invariants
//!
//! - Byte-identical inputs always produce byte-identical fingerprints
//! - Object key order never affects a fingerprint
//! - Fingerprints carry no wall-clock time, randomness, or instance data

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Timeout waiting for convergence.
    #[error("timeout after {elapsed:?} waiting for {resource}")]
    Timeout {
        resource: String,
        elapsed: Duration,
    },
}

/// Fingerprint computation and parsing errors.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The desired configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The hex encoding was malformed.
    #[error("invalid fingerprint encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded value had the wrong length.
    #[error("invalid fingerprint length: expected {FINGERPRINT_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// A configuration fingerprint.
///
/// The sole oracle for "is this node already correct": two configurations
/// with the same canonical JSON always hash identically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Compute a fingerprint from any serializable value.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, FingerprintError> {
        let json = serde_json::to_value(value)?;
        Ok(Self::from_json(&json))
    }

    /// Compute a fingerprint from canonical JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let canonical = canonical_json(json);
        let digest = Sha256::digest(canonical.as_bytes());
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Build a fingerprint from raw bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded fingerprint.
    pub fn from_hex(s: &str) -> Result<Self, FingerprintError> {
        let decoded = hex::decode(s)?;
        let bytes: [u8; FINGERPRINT_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| FingerprintError::InvalidLength(decoded.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Produce canonical JSON (sorted keys, no extra whitespace).
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", escape_json_string(k), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        serde_json::Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        serde_json::Value::String(s) => format!("\"{}\"", escape_json_string(s)),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Node classification against the desired fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    /// Last-applied fingerprint matches the desired one.
    Converged,

    /// Never applied, or applied an older configuration.
    Stale,
}

/// Classify a node from its last-applied fingerprint.
pub fn classify(applied: Option<&Fingerprint>, desired: &Fingerprint) -> NodeClass {
    match applied {
        Some(applied) if applied == desired => NodeClass::Converged,
        _ => NodeClass::Stale,
    }
}

/// Split nodes into (converged, stale), preserving input order in both.
pub fn partition_converged<I, F>(
    nodes: I,
    desired: &Fingerprint,
    applied: F,
) -> (Vec<I::Item>, Vec<I::Item>)
where
    I: IntoIterator,
    F: Fn(&I::Item) -> Option<Fingerprint>,
{
    let mut converged = Vec::new();
    let mut stale = Vec::new();

    for node in nodes {
        match classify(applied(&node).as_ref(), desired) {
            NodeClass::Converged => converged.push(node),
            NodeClass::Stale => stale.push(node),
        }
    }

    (converged, stale)
}

//! rotor Rotator Library
//!
//! Rolling rotation of the virtual machines behind a managed cluster's node
//! pools, plus the control-plane disaster-recovery path.
//!
//! ## Architecture
//!
//! - **Hasher**: Computes a deterministic fingerprint of a pool's desired
//!   configuration
//! - **Ledger**: Durable record of the fingerprint each node last converged to
//! - **Orchestrator**: Rotates a pool's stale nodes one at a time
//!   (drain, deallocate, update, reimage, start, wait ready, commit)
//! - **Recovery**: Deletes the control-plane pool and resets only its ledger
//!   entries ahead of a restore from backup
//!
//! Every operation is a single-shot, idempotent primitive: failures abort
//! with a [`StepFailure`] naming the step, and the caller re-invokes.
//!
//! ## Modules
//!
//! - `clients`: Capability interfaces for the cloud and workload platform
//! - `ledger`: Ledger document and its stores
//! - `mock`: In-memory collaborators for tests and dry runs

pub mod cancel;
pub mod clients;
pub mod config;
pub mod error;
pub mod hasher;
pub mod ledger;
pub mod mock;
pub mod orchestrator;
pub mod pool;
pub mod recovery;

// Re-export commonly used types
pub use cancel::Cancellation;
pub use config::Config;
pub use error::{Interrupted, Step, StepFailure, StepResult};
pub use hasher::{PoolHasher, ScaleSetHasher};
pub use ledger::{ConvergenceLedger, LedgerStore};
pub use orchestrator::{NodeTransition, RotationConfig, RotationContext, RotationOrchestrator};
pub use pool::{NodeIdentity, Pool, PoolRole, VmInstance};
pub use recovery::{reset_pool_convergence, RecoveryCoordinator};
pub use rotor_reconcile::Fingerprint;

//! Failure taxonomy for rotation and recovery.
//!
//! Every error this crate surfaces is a [`StepFailure`]: the step that was
//! running plus the underlying cause. Failures are never retried or
//! suppressed locally; the caller re-invokes the whole operation.

use std::fmt;

use thiserror::Error;

/// The operation that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Computing the desired fingerprint of the pool.
    HashScaleSet,
    /// Loading the convergence ledger.
    ReadBlob,
    /// Enumerating the pool's live instances.
    ListVMs,
    /// Evicting workload from a node.
    Drain,
    /// Stopping the instance while keeping its disk and identity.
    Deallocate,
    /// Applying scale-set model changes to one instance.
    UpdateModel,
    /// Resetting the instance to the pool's base image.
    Reimage,
    /// Powering the instance back on.
    Start,
    /// Waiting for the workload platform to report the node ready.
    WaitReady,
    /// Persisting the ledger after a node converged.
    UpdateBlob,
    /// Deleting the control-plane compute resource.
    DeletePool,
    /// Removing control-plane entries from the ledger.
    ResetConvergence,
    /// Enumerating backups.
    ListBackups,
}

impl Step {
    /// Stable tag for this step.
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::HashScaleSet => "hash_scale_set",
            Step::ReadBlob => "read_blob",
            Step::ListVMs => "list_vms",
            Step::Drain => "drain",
            Step::Deallocate => "deallocate",
            Step::UpdateModel => "update_model",
            Step::Reimage => "reimage",
            Step::Start => "start",
            Step::WaitReady => "wait_ready",
            Step::UpdateBlob => "update_blob",
            Step::DeletePool => "delete_pool",
            Step::ResetConvergence => "reset_convergence",
            Step::ListBackups => "list_backups",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed step and its cause.
#[derive(Debug, Error)]
#[error("{step}: {cause}")]
pub struct StepFailure {
    pub step: Step,
    #[source]
    pub cause: anyhow::Error,
}

impl StepFailure {
    pub fn new(step: Step, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            step,
            cause: cause.into(),
        }
    }

    /// Returns true if the step was abandoned because of cancellation or
    /// the rotation deadline rather than a remote error.
    pub fn is_interrupted(&self) -> bool {
        self.cause.downcast_ref::<Interrupted>().is_some()
    }
}

/// Reasons a step was abandoned before its remote call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Result type for rotation and recovery operations.
pub type StepResult<T> = Result<T, StepFailure>;

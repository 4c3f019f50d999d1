//! Disaster recovery of the control-plane pool.
//!
//! Rebuilding masters from a backup discards the whole control-plane
//! compute resource instead of rotating it node by node, then forgets the
//! control-plane ledger entries so the next rotation reconverges those
//! nodes. Infra and compute entries are left alone so those pools are not
//! rotated as a side effect.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::clients::{BackupDescriptor, BackupStore, ScaleSets};
use crate::error::{Step, StepFailure, StepResult};
use crate::ledger::LedgerStore;
use crate::pool::scale_set_name;

/// Remove every ledger entry of `pool_name` and persist the result.
///
/// Returns the number of entries removed.
pub async fn reset_pool_convergence(
    store: &dyn LedgerStore,
    pool_name: &str,
) -> StepResult<usize> {
    let mut ledger = store
        .read()
        .await
        .map_err(|e| StepFailure::new(Step::ResetConvergence, e))?;

    let removed = ledger.remove_pool(pool_name);

    store
        .write(&ledger)
        .await
        .map_err(|e| StepFailure::new(Step::ResetConvergence, e))?;

    info!(
        pool = pool_name,
        removed,
        remaining = ledger.len(),
        "Reset pool convergence"
    );
    Ok(removed)
}

/// Control-plane recovery operations.
pub struct RecoveryCoordinator {
    ledger: Arc<dyn LedgerStore>,
    scale_sets: Arc<dyn ScaleSets>,
    backups: Arc<dyn BackupStore>,
    control_plane_pool: String,
}

impl RecoveryCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        scale_sets: Arc<dyn ScaleSets>,
        backups: Arc<dyn BackupStore>,
        control_plane_pool: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            scale_sets,
            backups,
            control_plane_pool: control_plane_pool.into(),
        }
    }

    /// Delete the entire compute resource backing the control-plane pool.
    #[instrument(skip(self), fields(pool = %self.control_plane_pool))]
    pub async fn delete_control_plane_pool(&self) -> StepResult<()> {
        let scale_set = scale_set_name(&self.control_plane_pool);
        info!(scale_set = %scale_set, "Deleting control-plane scale set");

        self.scale_sets
            .delete(&scale_set)
            .await
            .map_err(|e| StepFailure::new(Step::DeletePool, e))
    }

    /// Forget the convergence of every control-plane node.
    #[instrument(skip(self), fields(pool = %self.control_plane_pool))]
    pub async fn reset_control_plane_convergence(&self) -> StepResult<()> {
        reset_pool_convergence(self.ledger.as_ref(), &self.control_plane_pool).await?;
        Ok(())
    }

    /// Available backups, newest first.
    pub async fn list_backups(&self) -> StepResult<Vec<BackupDescriptor>> {
        let mut backups = self
            .backups
            .list_backups()
            .await
            .map_err(|e| StepFailure::new(Step::ListBackups, e))?;

        backups.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(backups)
    }
}

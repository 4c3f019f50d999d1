//! Rolling rotation of a pool's nodes.
//!
//! A rotation:
//! 1. Hashes the pool's desired configuration
//! 2. Loads the convergence ledger
//! 3. Lists the pool's live instances and sorts them by node identity
//! 4. Skips every node whose ledger entry already matches the desired hash
//! 5. Takes each remaining node through [`NodeTransition`], one node at a time
//! 6. Persists the ledger right after each node converges
//!
//! Nodes of one pool are never mutated concurrently, so a control-plane pool
//! loses at most one member at a time. Any failure aborts the rotation
//! without rollback; every transition is safe to redo, so the caller simply
//! re-invokes the rotation and it resumes at the first stale node.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rotor_reconcile::{partition_converged, Fingerprint, ReconcileError};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::cancel::Cancellation;
use crate::clients::{Inventory, Lifecycle, WorkloadPlatform};
use crate::error::{Step, StepFailure, StepResult};
use crate::hasher::PoolHasher;
use crate::ledger::{ConvergenceLedger, LedgerStore};
use crate::pool::{NodeIdentity, Pool, VmInstance};

/// Lower bound on the interval between readiness probes.
pub const MIN_READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Upper bound on waiting for one node to become ready.
    pub ready_timeout: Duration,

    /// Interval between readiness probes, never less than
    /// [`MIN_READY_POLL_INTERVAL`].
    pub ready_poll_interval: Duration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(20 * 60),
            ready_poll_interval: Duration::from_secs(5),
        }
    }
}

/// The ordered transitions a stale node goes through.
///
/// Draining precedes deallocation so workload is evicted rather than killed.
/// The instance must be deallocated before it can be reimaged. Readiness
/// gates the commit: a node is only recorded as converged once it is
/// observably healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTransition {
    Drain,
    Deallocate,
    UpdateModel,
    Reimage,
    Start,
    WaitReady,
    Commit,
}

impl NodeTransition {
    pub const SEQUENCE: [NodeTransition; 7] = [
        Self::Drain,
        Self::Deallocate,
        Self::UpdateModel,
        Self::Reimage,
        Self::Start,
        Self::WaitReady,
        Self::Commit,
    ];

    pub fn first() -> Self {
        Self::SEQUENCE[0]
    }

    /// The transition after this one, or `None` after [`Self::Commit`].
    pub fn next(self) -> Option<Self> {
        let index = Self::SEQUENCE.iter().position(|t| *t == self)?;
        Self::SEQUENCE.get(index + 1).copied()
    }

    /// Failure tag for this transition.
    pub fn step(self) -> Step {
        match self {
            Self::Drain => Step::Drain,
            Self::Deallocate => Step::Deallocate,
            Self::UpdateModel => Step::UpdateModel,
            Self::Reimage => Step::Reimage,
            Self::Start => Step::Start,
            Self::WaitReady => Step::WaitReady,
            Self::Commit => Step::UpdateBlob,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drain => "drain",
            Self::Deallocate => "deallocate",
            Self::UpdateModel => "update_model",
            Self::Reimage => "reimage",
            Self::Start => "start",
            Self::WaitReady => "wait_ready",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for NodeTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators of a rotation, injected once.
#[derive(Clone)]
pub struct RotationContext {
    pub hasher: Arc<dyn PoolHasher>,
    pub ledger: Arc<dyn LedgerStore>,
    pub inventory: Arc<dyn Inventory>,
    pub lifecycle: Arc<dyn Lifecycle>,
    pub workload: Arc<dyn WorkloadPlatform>,
}

/// Drives pools to their desired configuration.
///
/// Only one orchestrator may run against a ledger at a time; the ledger is
/// replaced wholesale on every commit.
pub struct RotationOrchestrator {
    ctx: RotationContext,
    config: RotationConfig,
}

impl RotationOrchestrator {
    pub fn new(ctx: RotationContext, config: RotationConfig) -> Self {
        Self { ctx, config }
    }

    /// Rotate every stale node of `pool`, in identity order.
    #[instrument(skip_all, fields(pool = %pool.name))]
    pub async fn rotate_pool(&self, pool: &Pool, cancel: &Cancellation) -> StepResult<()> {
        let desired = self
            .ctx
            .hasher
            .hash_pool(pool)
            .map_err(|e| StepFailure::new(Step::HashScaleSet, e))?;

        let mut ledger = cancel
            .run(Step::ReadBlob, async {
                self.ctx.ledger.read().await.map_err(anyhow::Error::from)
            })
            .await?;

        let scale_set = pool.scale_set_name();
        let mut instances = cancel
            .run(Step::ListVMs, self.ctx.inventory.list_instances(&scale_set))
            .await?;

        // Fixed order so an interrupted rotation resumes where it stopped.
        instances.sort_by(|a, b| a.identity.cmp(&b.identity));

        let (converged, stale) =
            partition_converged(instances, &desired, |vm: &VmInstance| {
                ledger.get(&vm.identity).copied()
            });

        for vm in &converged {
            info!(node = %vm.identity, "Skipping node, already converged");
        }

        info!(
            desired = %desired,
            converged = converged.len(),
            stale = stale.len(),
            "Rotating pool"
        );

        for vm in &stale {
            self.rotate_node(&scale_set, vm, &desired, &mut ledger, cancel)
                .await
                .inspect_err(|e| {
                    warn!(
                        node = %vm.identity,
                        step = %e.step,
                        error = %e.cause,
                        "Node rotation failed"
                    );
                })?;
        }

        info!(rotated = stale.len(), "Pool converged");
        Ok(())
    }

    /// Rotate several pools strictly one after another.
    ///
    /// The control-plane pool goes first; the others follow in the given
    /// order. Stops at the first failure.
    pub async fn rotate_pools(&self, pools: &[Pool], cancel: &Cancellation) -> StepResult<()> {
        let mut ordered: Vec<&Pool> = pools.iter().collect();
        ordered.sort_by_key(|pool| !pool.role.is_control_plane());

        for pool in ordered {
            self.rotate_pool(pool, cancel).await?;
        }
        Ok(())
    }

    async fn rotate_node(
        &self,
        scale_set: &str,
        vm: &VmInstance,
        desired: &Fingerprint,
        ledger: &mut ConvergenceLedger,
        cancel: &Cancellation,
    ) -> StepResult<()> {
        let mut transition = Some(NodeTransition::first());

        while let Some(current) = transition {
            info!(node = %vm.identity, transition = %current, "Applying transition");
            self.apply(current, scale_set, vm, desired, ledger, cancel)
                .await?;
            transition = current.next();
        }

        Ok(())
    }

    async fn apply(
        &self,
        transition: NodeTransition,
        scale_set: &str,
        vm: &VmInstance,
        desired: &Fingerprint,
        ledger: &mut ConvergenceLedger,
        cancel: &Cancellation,
    ) -> StepResult<()> {
        let step = transition.step();
        let lifecycle = &self.ctx.lifecycle;

        match transition {
            NodeTransition::Drain => {
                cancel
                    .run(step, self.ctx.workload.drain(&vm.identity))
                    .await
            }
            NodeTransition::Deallocate => {
                cancel
                    .run(step, lifecycle.deallocate(scale_set, &vm.handle))
                    .await
            }
            NodeTransition::UpdateModel => {
                cancel
                    .run(step, lifecycle.update_model(scale_set, &vm.handle))
                    .await
            }
            NodeTransition::Reimage => {
                cancel
                    .run(step, lifecycle.reimage(scale_set, &vm.handle))
                    .await
            }
            NodeTransition::Start => {
                cancel
                    .run(step, lifecycle.start(scale_set, &vm.handle))
                    .await
            }
            NodeTransition::WaitReady => self.wait_ready(&vm.identity, cancel).await,
            NodeTransition::Commit => {
                ledger.record(vm.identity.clone(), *desired);
                let ledger: &ConvergenceLedger = ledger;
                cancel
                    .run(step, async {
                        self.ctx.ledger.write(ledger).await.map_err(anyhow::Error::from)
                    })
                    .await
            }
        }
    }

    /// Poll readiness until the node reports ready or the timeout elapses.
    ///
    /// Probe errors are tolerated while the node reboots; the last one is
    /// attached to the timeout failure.
    async fn wait_ready(&self, node: &NodeIdentity, cancel: &Cancellation) -> StepResult<()> {
        let started = Instant::now();
        let deadline = started + self.config.ready_timeout;
        let poll_interval = self.config.ready_poll_interval.max(MIN_READY_POLL_INTERVAL);
        let mut last_error: Option<anyhow::Error> = None;

        loop {
            let probe = tokio::time::timeout_at(
                deadline,
                cancel.run(Step::WaitReady, self.ctx.workload.is_ready(node)),
            )
            .await;

            match probe {
                Ok(Ok(true)) => {
                    debug!(node = %node, elapsed = ?started.elapsed(), "Node is ready");
                    return Ok(());
                }
                Ok(Ok(false)) => debug!(node = %node, "Node not ready yet"),
                Ok(Err(e)) if e.is_interrupted() => return Err(e),
                Ok(Err(e)) => {
                    debug!(node = %node, error = %e.cause, "Readiness probe failed");
                    last_error = Some(e.cause);
                }
                Err(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                let timeout = ReconcileError::Timeout {
                    resource: format!("node {node} to become ready"),
                    elapsed: now - started,
                };
                let cause = match last_error {
                    Some(err) => err.context(timeout),
                    None => anyhow::Error::from(timeout),
                };
                return Err(StepFailure::new(Step::WaitReady, cause));
            }

            cancel
                .sleep(Step::WaitReady, poll_interval.min(deadline - now))
                .await?;
        }
    }
}

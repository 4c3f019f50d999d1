//! Mock cloud and workload platform for testing and development.
//!
//! [`MockCloud`] implements every collaborator interface. It records each
//! call, tracks the power state of instances, and can be told to fail or
//! hang on a specific operation for a specific target.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::clients::{
    BackupDescriptor, BackupStore, Inventory, Lifecycle, ScaleSets, WorkloadPlatform,
};
use crate::pool::{
    ImageReference, InstanceHandle, NodeIdentity, Pool, PoolRole, TestOverrides, VmInstance,
};

/// Operations observable on the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListInstances,
    Drain,
    Deallocate,
    UpdateModel,
    Reimage,
    Start,
    ReadyProbe,
    DeleteScaleSet,
    ListBackups,
}

impl Op {
    /// Returns true for operations that change a node or resource.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Op::Drain
                | Op::Deallocate
                | Op::UpdateModel
                | Op::Reimage
                | Op::Start
                | Op::DeleteScaleSet
        )
    }
}

/// One recorded call. `target` is the node identity for per-node
/// operations and the scale set name otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub target: String,
}

#[derive(Debug, Default)]
struct State {
    scale_sets: BTreeMap<String, Vec<VmInstance>>,
    stopped: HashSet<String>,
    calls: Vec<Call>,
    failures: HashSet<(Op, String)>,
    hangs: HashSet<(Op, String)>,
    not_ready_polls: HashMap<String, usize>,
    never_ready: HashSet<String>,
    backups: Vec<BackupDescriptor>,
}

enum Outcome {
    Proceed,
    Fail,
    Hang,
}

/// In-memory stand-in for the cloud provider and workload platform.
#[derive(Debug, Default)]
pub struct MockCloud {
    state: Mutex<State>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add running instances to a scale set, as `(identity, handle)` pairs.
    pub fn add_instances(&self, scale_set: &str, instances: &[(&str, &str)]) {
        let mut state = self.state();
        let entry = state.scale_sets.entry(scale_set.to_string()).or_default();
        entry.extend(
            instances
                .iter()
                .map(|(identity, handle)| VmInstance::new(identity, *handle)),
        );
    }

    /// Make `op` fail whenever it targets `target`.
    pub fn fail_on(&self, op: Op, target: &str) {
        self.state().failures.insert((op, target.to_string()));
    }

    /// Make `op` never complete whenever it targets `target`.
    pub fn hang_on(&self, op: Op, target: &str) {
        self.state().hangs.insert((op, target.to_string()));
    }

    /// Remove all injected failures and hangs.
    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.failures.clear();
        state.hangs.clear();
    }

    /// Report `node` as not ready for the next `polls` probes.
    pub fn not_ready_for(&self, node: &str, polls: usize) {
        self.state().not_ready_polls.insert(node.to_string(), polls);
    }

    /// Never report `node` as ready.
    pub fn never_ready(&self, node: &str) {
        self.state().never_ready.insert(node.to_string());
    }

    pub fn set_backups(&self, backups: Vec<BackupDescriptor>) {
        self.state().backups = backups;
    }

    pub fn scale_set_exists(&self, scale_set: &str) -> bool {
        self.state().scale_sets.contains_key(scale_set)
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Mutating calls so far, in order.
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op.is_mutating())
            .cloned()
            .collect()
    }

    /// Operations issued against `target`, in order.
    pub fn ops_for(&self, target: &str) -> Vec<Op> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.target == target)
            .map(|c| c.op)
            .collect()
    }

    /// Distinct targets of mutating calls, in first-touched order.
    pub fn touched_nodes(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for call in self.mutating_calls() {
            if !seen.contains(&call.target) {
                seen.push(call.target);
            }
        }
        seen
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    fn record(&self, op: Op, target: &str) -> Outcome {
        let mut state = self.state();
        state.calls.push(Call {
            op,
            target: target.to_string(),
        });

        let key = (op, target.to_string());
        if state.hangs.contains(&key) {
            Outcome::Hang
        } else if state.failures.contains(&key) {
            Outcome::Fail
        } else {
            Outcome::Proceed
        }
    }

    async fn invoke(&self, op: Op, target: &str) -> Result<()> {
        match self.record(op, target) {
            Outcome::Proceed => Ok(()),
            Outcome::Fail => anyhow::bail!("[MOCK] {op:?} failed for {target}"),
            Outcome::Hang => std::future::pending().await,
        }
    }

    /// Resolve a handle to the identity of the instance it addresses.
    fn identity_of(&self, scale_set: &str, handle: &InstanceHandle) -> Result<String> {
        self.state()
            .scale_sets
            .get(scale_set)
            .and_then(|vms| vms.iter().find(|vm| &vm.handle == handle))
            .map(|vm| vm.identity.to_string())
            .ok_or_else(|| anyhow::anyhow!("[MOCK] instance {handle} not found in {scale_set}"))
    }
}

#[async_trait]
impl Inventory for MockCloud {
    async fn list_instances(&self, scale_set: &str) -> Result<Vec<VmInstance>> {
        self.invoke(Op::ListInstances, scale_set).await?;

        self.state()
            .scale_sets
            .get(scale_set)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("[MOCK] scale set {scale_set} not found"))
    }
}

#[async_trait]
impl Lifecycle for MockCloud {
    async fn deallocate(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()> {
        let node = self.identity_of(scale_set, instance)?;
        self.invoke(Op::Deallocate, &node).await?;
        info!(node = %node, "[MOCK] Deallocated instance");
        self.state().stopped.insert(node);
        Ok(())
    }

    async fn update_model(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()> {
        let node = self.identity_of(scale_set, instance)?;
        self.invoke(Op::UpdateModel, &node).await?;
        debug!(node = %node, "[MOCK] Updated instance model");
        Ok(())
    }

    async fn reimage(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()> {
        let node = self.identity_of(scale_set, instance)?;
        self.invoke(Op::Reimage, &node).await?;
        if !self.state().stopped.contains(&node) {
            anyhow::bail!("[MOCK] cannot reimage running instance {node}");
        }
        info!(node = %node, "[MOCK] Reimaged instance");
        Ok(())
    }

    async fn start(&self, scale_set: &str, instance: &InstanceHandle) -> Result<()> {
        let node = self.identity_of(scale_set, instance)?;
        self.invoke(Op::Start, &node).await?;
        info!(node = %node, "[MOCK] Started instance");
        self.state().stopped.remove(&node);
        Ok(())
    }
}

#[async_trait]
impl ScaleSets for MockCloud {
    async fn delete(&self, scale_set: &str) -> Result<()> {
        self.invoke(Op::DeleteScaleSet, scale_set).await?;
        info!(scale_set, "[MOCK] Deleted scale set");
        self.state().scale_sets.remove(scale_set);
        Ok(())
    }
}

#[async_trait]
impl WorkloadPlatform for MockCloud {
    async fn drain(&self, node: &NodeIdentity) -> Result<()> {
        self.invoke(Op::Drain, node.as_str()).await?;
        info!(node = %node, "[MOCK] Drained node");
        Ok(())
    }

    async fn is_ready(&self, node: &NodeIdentity) -> Result<bool> {
        self.invoke(Op::ReadyProbe, node.as_str()).await?;

        let mut state = self.state();
        if state.never_ready.contains(node.as_str()) || state.stopped.contains(node.as_str()) {
            return Ok(false);
        }
        match state.not_ready_polls.get_mut(node.as_str()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}

#[async_trait]
impl BackupStore for MockCloud {
    async fn list_backups(&self) -> Result<Vec<BackupDescriptor>> {
        self.invoke(Op::ListBackups, "backups").await?;
        Ok(self.state().backups.clone())
    }
}

/// A representative pool definition for tests and dry runs.
pub fn sample_pool(name: &str, role: PoolRole) -> Pool {
    Pool {
        name: name.to_string(),
        role,
        count: 3,
        vm_size: "Standard_D4s_v3".to_string(),
        image: ImageReference {
            publisher: "redhat".to_string(),
            offer: "osa".to_string(),
            sku: "osa_311".to_string(),
            version: "311.43.20181121".to_string(),
        },
        startup_script: format!("#!/bin/bash\nexec /usr/local/bin/bootstrap --role {role:?}\n"),
        test_overrides: TestOverrides::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> MockCloud {
        let cloud = MockCloud::new();
        cloud.add_instances("ss-master", &[("master-000000", "0")]);
        cloud
    }

    #[tokio::test]
    async fn test_reimage_requires_deallocation() {
        let cloud = cloud();
        let handle = InstanceHandle::new("0");

        assert!(cloud.reimage("ss-master", &handle).await.is_err());

        cloud.deallocate("ss-master", &handle).await.unwrap();
        cloud.reimage("ss-master", &handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_on_targets_one_op() {
        let cloud = cloud();
        cloud.fail_on(Op::Drain, "master-000000");
        let node = NodeIdentity::new("master-000000");

        assert!(cloud.drain(&node).await.is_err());
        assert!(cloud.is_ready(&node).await.unwrap());
        assert_eq!(cloud.ops_for("master-000000"), vec![Op::Drain, Op::ReadyProbe]);
    }

    #[tokio::test]
    async fn test_not_ready_countdown() {
        let cloud = cloud();
        cloud.not_ready_for("master-000000", 2);
        let node = NodeIdentity::new("master-000000");

        assert!(!cloud.is_ready(&node).await.unwrap());
        assert!(!cloud.is_ready(&node).await.unwrap());
        assert!(cloud.is_ready(&node).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_scale_set_is_an_error() {
        assert!(cloud().list_instances("ss-infra").await.is_err());
    }
}

//! Integration tests for control-plane recovery.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rotor_reconcile::{Fingerprint, FINGERPRINT_LEN};
use rotor_rotator::clients::BackupDescriptor;
use rotor_rotator::ledger::{FileLedgerStore, MemoryLedgerStore};
use rotor_rotator::mock::{sample_pool, MockCloud, Op};
use rotor_rotator::{
    reset_pool_convergence, Cancellation, ConvergenceLedger, LedgerStore, NodeIdentity, PoolRole,
    RecoveryCoordinator, RotationConfig, RotationContext, RotationOrchestrator, ScaleSetHasher,
    Step,
};

fn fp(b: u8) -> Fingerprint {
    Fingerprint::from_bytes([b; FINGERPRINT_LEN])
}

fn node(name: &str) -> NodeIdentity {
    NodeIdentity::new(name)
}

fn mixed_ledger() -> ConvergenceLedger {
    [
        (node("master-0"), fp(1)),
        (node("infra-0"), fp(2)),
        (node("mycompute-0"), fp(3)),
    ]
    .into_iter()
    .collect()
}

fn coordinator(cloud: &Arc<MockCloud>, ledger: &Arc<MemoryLedgerStore>) -> RecoveryCoordinator {
    RecoveryCoordinator::new(ledger.clone(), cloud.clone(), cloud.clone(), "master")
}

fn backup(name: &str, day: u32) -> BackupDescriptor {
    BackupDescriptor {
        name: name.to_string(),
        size_bytes: 1024,
        last_modified: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_reset_keeps_other_pools() {
    let ledger = Arc::new(MemoryLedgerStore::with_ledger(&mixed_ledger()).unwrap());
    let cloud = Arc::new(MockCloud::new());

    coordinator(&cloud, &ledger)
        .reset_control_plane_convergence()
        .await
        .unwrap();

    let after = ledger.read().await.unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after.get(&node("master-0")), None);
    assert_eq!(after.get(&node("infra-0")), Some(&fp(2)));
    assert_eq!(after.get(&node("mycompute-0")), Some(&fp(3)));
}

#[tokio::test]
async fn test_reset_pool_convergence_counts_removed() {
    let ledger = MemoryLedgerStore::with_ledger(&mixed_ledger()).unwrap();

    assert_eq!(reset_pool_convergence(&ledger, "infra").await.unwrap(), 1);
    assert_eq!(reset_pool_convergence(&ledger, "infra").await.unwrap(), 0);
    assert_eq!(ledger.read().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_reset_matches_mixed_case_stored_identities() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "Master-000000": fp(1).to_hex(),
            "infra-0": fp(2).to_hex(),
        })
        .to_string(),
    )
    .unwrap();
    let store = FileLedgerStore::new(path);

    assert_eq!(reset_pool_convergence(&store, "master").await.unwrap(), 1);

    let after = store.read().await.unwrap();
    let keys: Vec<&str> = after.iter().map(|(node, _)| node.as_str()).collect();
    assert_eq!(keys, vec!["infra-0"]);
}

#[tokio::test]
async fn test_reset_failure_is_tagged() {
    let ledger = Arc::new(MemoryLedgerStore::new());
    ledger.set_fail_writes(true);
    let cloud = Arc::new(MockCloud::new());

    let err = coordinator(&cloud, &ledger)
        .reset_control_plane_convergence()
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::ResetConvergence);
}

#[tokio::test]
async fn test_delete_removes_only_control_plane_scale_set() {
    let cloud = Arc::new(MockCloud::new());
    cloud.add_instances("ss-master", &[("master-000000", "0")]);
    cloud.add_instances("ss-infra", &[("infra-000000", "0")]);
    let ledger = Arc::new(MemoryLedgerStore::new());

    coordinator(&cloud, &ledger)
        .delete_control_plane_pool()
        .await
        .unwrap();

    assert!(!cloud.scale_set_exists("ss-master"));
    assert!(cloud.scale_set_exists("ss-infra"));
    assert_eq!(cloud.ops_for("ss-master"), vec![Op::DeleteScaleSet]);
}

#[tokio::test]
async fn test_delete_failure_is_tagged() {
    let cloud = Arc::new(MockCloud::new());
    cloud.fail_on(Op::DeleteScaleSet, "ss-master");
    let ledger = Arc::new(MemoryLedgerStore::new());

    let err = coordinator(&cloud, &ledger)
        .delete_control_plane_pool()
        .await
        .unwrap_err();

    assert_eq!(err.step, Step::DeletePool);
}

#[tokio::test]
async fn test_list_backups_newest_first() {
    let cloud = Arc::new(MockCloud::new());
    cloud.set_backups(vec![
        backup("etcd-b", 2),
        backup("etcd-c", 9),
        backup("etcd-a", 2),
    ]);
    let ledger = Arc::new(MemoryLedgerStore::new());

    let names: Vec<String> = coordinator(&cloud, &ledger)
        .list_backups()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();

    assert_eq!(names, vec!["etcd-c", "etcd-a", "etcd-b"]);
}

#[tokio::test]
async fn test_list_backups_failure_is_tagged() {
    let cloud = Arc::new(MockCloud::new());
    cloud.fail_on(Op::ListBackups, "backups");
    let ledger = Arc::new(MemoryLedgerStore::new());

    let err = coordinator(&cloud, &ledger).list_backups().await.unwrap_err();

    assert_eq!(err.step, Step::ListBackups);
}

#[tokio::test]
async fn test_rebuilt_control_plane_is_rotated_alone() {
    let cloud = Arc::new(MockCloud::new());
    cloud.add_instances("ss-master", &[("master-000000", "0"), ("master-000001", "1")]);
    cloud.add_instances("ss-infra", &[("infra-000000", "0")]);
    let ledger = Arc::new(MemoryLedgerStore::new());

    let orchestrator = RotationOrchestrator::new(
        RotationContext {
            hasher: Arc::new(ScaleSetHasher),
            ledger: ledger.clone(),
            inventory: cloud.clone(),
            lifecycle: cloud.clone(),
            workload: cloud.clone(),
        },
        RotationConfig {
            ready_timeout: std::time::Duration::from_millis(200),
            ready_poll_interval: std::time::Duration::from_millis(50),
        },
    );
    let pools = vec![
        sample_pool("master", PoolRole::Master),
        sample_pool("infra", PoolRole::Infra),
    ];
    orchestrator
        .rotate_pools(&pools, &Cancellation::none())
        .await
        .unwrap();

    let recovery = coordinator(&cloud, &ledger);
    recovery.delete_control_plane_pool().await.unwrap();
    recovery.reset_control_plane_convergence().await.unwrap();

    // The rebuilt pool comes back with the same identities.
    cloud.add_instances("ss-master", &[("master-000000", "0"), ("master-000001", "1")]);
    cloud.reset_calls();

    orchestrator
        .rotate_pools(&pools, &Cancellation::none())
        .await
        .unwrap();

    assert_eq!(cloud.touched_nodes(), vec!["master-000000", "master-000001"]);
    assert_eq!(ledger.read().await.unwrap().len(), 3);
}

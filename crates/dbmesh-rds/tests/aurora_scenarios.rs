//! End-to-end Aurora protocol scenarios against the in-memory control plane.

use std::sync::Arc;
use std::time::Duration;

use dbmesh_rds::mock::{Call, MockControlPlane};
use dbmesh_rds::{
    ApiError, ApiErrorKind, Aurora, AuroraConfig, ClusterId, Filter, InstanceId, Operation,
    RdsConfig, RdsError, RdsService, SnapshotId, Step, TopologyState,
};
use tokio_util::sync::CancellationToken;

fn setup() -> (Arc<MockControlPlane>, RdsService<MockControlPlane>) {
    let mock = Arc::new(MockControlPlane::new());
    let service = RdsService::with_defaults(Arc::clone(&mock));
    (mock, service)
}

fn call(operation: Operation, target: &str) -> Call {
    Call {
        operation,
        target: target.to_string(),
    }
}

fn throttled() -> ApiError {
    ApiError::new(ApiErrorKind::Throttled, "Throttling", "Rate exceeded")
}

fn db1(n: u32) -> AuroraConfig {
    AuroraConfig::new("db1")
        .engine("aurora-mysql")
        .db_instance_class("db.r6g.large")
        .instance_number(n)
        .skip_final_snapshot(true)
}

// =============================================================================
// Create / delete
// =============================================================================

#[tokio::test]
async fn create_with_primary_keeps_cluster_when_primary_fails() {
    let (mock, service) = setup();
    mock.fail_nth(Operation::CreateDbInstance, 1, throttled());

    let config = db1(3).primary_instance("db1-writer");
    let aborted = service.aurora(config).create_with_primary().await.unwrap_err();

    assert_eq!(
        aborted.failed,
        Step::CreateInstance {
            instance: InstanceId::new("db1-writer"),
        }
    );
    assert_eq!(
        aborted.steps,
        vec![Step::CreateCluster {
            cluster: ClusterId::new("db1"),
        }]
    );
    assert!(aborted.is_partial());
    assert!(mock.has_cluster("db1"));
    assert!(mock.members("db1").is_empty());
}

#[tokio::test]
async fn create_then_delete_three_members() {
    let (mock, service) = setup();
    let aurora = service.aurora(db1(3));

    let applied = aurora.create().await.unwrap();
    assert_eq!(applied.state, Some(TopologyState::Ready));
    assert_eq!(
        mock.calls(),
        vec![
            call(Operation::CreateDbCluster, "db1"),
            call(Operation::CreateDbInstance, "db1-instance-1"),
            call(Operation::CreateDbInstance, "db1-instance-2"),
            call(Operation::CreateDbInstance, "db1-instance-3"),
        ]
    );
    assert_eq!(
        mock.members("db1"),
        vec!["db1-instance-1", "db1-instance-2", "db1-instance-3"]
    );

    mock.clear_calls();
    let applied = aurora.delete().await.unwrap();
    assert_eq!(applied.state, Some(TopologyState::Absent));
    assert_eq!(
        mock.calls(),
        vec![
            call(Operation::DescribeDbInstances, "db1"),
            call(Operation::DeleteDbInstance, "db1-instance-1"),
            call(Operation::DeleteDbInstance, "db1-instance-2"),
            call(Operation::DeleteDbInstance, "db1-instance-3"),
            call(Operation::DeleteDbCluster, "db1"),
        ]
    );
    assert!(!mock.has_cluster("db1"));
    assert!(mock.instance_ids().is_empty());
}

#[tokio::test]
async fn create_stops_at_first_failed_member() {
    let (mock, service) = setup();
    mock.fail_nth(Operation::CreateDbInstance, 2, throttled());

    let aborted = service.aurora(db1(3)).create().await.unwrap_err();

    assert_eq!(
        aborted.failed,
        Step::CreateInstance {
            instance: InstanceId::new("db1-instance-2")
        }
    );
    assert_eq!(
        aborted.steps,
        vec![
            Step::CreateCluster {
                cluster: ClusterId::new("db1")
            },
            Step::CreateInstance {
                instance: InstanceId::new("db1-instance-1")
            },
        ]
    );
    assert!(aborted.is_partial());
    assert!(aborted.error.is_retriable());
    assert_eq!(
        mock.targets(Operation::CreateDbInstance),
        vec!["db1-instance-1", "db1-instance-2"]
    );
    assert_eq!(mock.members("db1"), vec!["db1-instance-1"]);
}

#[tokio::test]
async fn zero_members_creates_only_the_cluster() {
    let (mock, service) = setup();
    let applied = service.aurora(db1(0)).create().await.unwrap();
    assert!(applied.created_instances().is_empty());
    assert_eq!(mock.calls(), vec![call(Operation::CreateDbCluster, "db1")]);
}

#[tokio::test]
async fn delete_requires_final_snapshot_decision() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");

    let aborted = service
        .aurora(AuroraConfig::new("db1").instance_number(2))
        .delete()
        .await
        .unwrap_err();

    assert_eq!(aborted.failed, Step::CheckPreconditions);
    assert!(matches!(aborted.error, RdsError::Validation(_)));
    assert!(aborted.state.is_none());
    assert_eq!(mock.call_count(), 0);
    assert!(mock.has_cluster("db1"));
}

#[tokio::test]
async fn delete_takes_final_snapshot() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");
    mock.seed_instance("db1-instance-1", Some("db1"));

    service
        .aurora(AuroraConfig::new("db1").final_snapshot_identifier("db1-final"))
        .delete()
        .await
        .unwrap();

    assert!(!mock.has_cluster("db1"));
    assert!(mock.has_snapshot("db1-final"));
}

#[tokio::test]
async fn delete_enumerates_current_members() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");
    mock.seed_cluster("other");
    mock.seed_instance("db1-writer", Some("db1"));
    mock.seed_instance("db1-instance-7", Some("db1"));
    mock.seed_instance("other-instance-1", Some("other"));

    let config = db1(1).instance_filter(Filter::new("db-cluster-id", vec!["other".to_string()]));
    service.aurora(config).delete().await.unwrap();

    assert_eq!(mock.targets(Operation::DescribeDbInstances), vec!["db1"]);
    assert_eq!(
        mock.targets(Operation::DeleteDbInstance),
        vec!["db1-instance-7", "db1-writer"]
    );
    assert_eq!(mock.instance_ids(), vec!["other-instance-1"]);
    assert!(mock.has_cluster("other"));
}

#[tokio::test]
async fn failed_member_delete_keeps_cluster() {
    let (mock, service) = setup();
    service.aurora(db1(3)).create().await.unwrap();
    mock.clear_calls();
    mock.fail_nth(
        Operation::DeleteDbInstance,
        2,
        ApiError::new(
            ApiErrorKind::InvalidState,
            "InvalidDBInstanceState",
            "Instance is not available",
        ),
    );

    let aborted = service.aurora(db1(3)).delete().await.unwrap_err();

    assert_eq!(
        aborted.failed,
        Step::DeleteInstance {
            instance: InstanceId::new("db1-instance-2")
        }
    );
    assert!(aborted.is_partial());
    assert!(mock.targets(Operation::DeleteDbCluster).is_empty());
    assert!(mock.has_cluster("db1"));
    assert_eq!(mock.members("db1"), vec!["db1-instance-2", "db1-instance-3"]);
}

#[tokio::test]
async fn delete_of_absent_topology_succeeds() {
    let (mock, service) = setup();
    let applied = service.aurora(db1(2)).delete().await.unwrap();
    assert_eq!(applied.state, Some(TopologyState::Absent));
    assert_eq!(
        mock.calls(),
        vec![
            call(Operation::DescribeDbInstances, "db1"),
            call(Operation::DeleteDbCluster, "db1"),
        ]
    );
}

// =============================================================================
// Snapshots and restores
// =============================================================================

#[tokio::test]
async fn snapshot_is_idempotent() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");
    let aurora = service.aurora(db1(1).snapshot_identifier("snap1"));

    let first = aurora.create_snapshot().await.unwrap();
    assert!(first.changed());
    let second = aurora.create_snapshot().await.unwrap();
    assert!(!second.changed());
    assert_eq!(second.state, None);

    assert_eq!(
        mock.calls(),
        vec![
            call(Operation::DescribeDbClusterSnapshots, "snap1"),
            call(Operation::CreateDbClusterSnapshot, "snap1"),
            call(Operation::DescribeDbClusterSnapshots, "snap1"),
        ]
    );
    let desc = aurora.describe_snapshot().await.unwrap().unwrap();
    assert_eq!(desc.snapshot_id(), SnapshotId::new("snap1"));
    assert_eq!(desc.db_cluster_identifier, "db1");
}

#[tokio::test]
async fn snapshot_requires_identifier() {
    let (mock, service) = setup();
    let aborted = service.aurora(db1(1)).create_snapshot().await.unwrap_err();
    assert_eq!(aborted.failed, Step::CheckPreconditions);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn restore_from_snapshot_reattaches_members() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");
    mock.seed_snapshot("snap1", "db1");

    let config = AuroraConfig::new("db2")
        .snapshot_identifier("snap1")
        .instance_number(2)
        .db_instance_class("db.r6g.large");
    let applied = service.aurora(config).restore_from_snapshot().await.unwrap();

    assert_eq!(applied.state, Some(TopologyState::Ready));
    assert_eq!(
        mock.calls(),
        vec![
            call(Operation::RestoreDbClusterFromSnapshot, "db2"),
            call(Operation::CreateDbInstance, "db2-instance-1"),
            call(Operation::CreateDbInstance, "db2-instance-2"),
        ]
    );
    assert_eq!(mock.members("db2"), vec!["db2-instance-1", "db2-instance-2"]);
}

#[tokio::test]
async fn restore_from_snapshot_stops_at_failed_member() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");
    mock.seed_snapshot("snap1", "db1");
    mock.fail_nth(Operation::CreateDbInstance, 2, throttled());

    let config = AuroraConfig::new("db2")
        .snapshot_identifier("snap1")
        .instance_number(3);
    let aborted = service.aurora(config).restore_from_snapshot().await.unwrap_err();

    assert_eq!(
        aborted.failed,
        Step::CreateInstance {
            instance: InstanceId::new("db2-instance-2"),
        }
    );
    assert_eq!(
        aborted.steps,
        vec![
            Step::RestoreFromSnapshot {
                cluster: ClusterId::new("db2"),
                snapshot: SnapshotId::new("snap1"),
            },
            Step::CreateInstance {
                instance: InstanceId::new("db2-instance-1"),
            },
        ]
    );
    assert_eq!(aborted.state, Some(TopologyState::Partial));
    assert_eq!(
        mock.targets(Operation::CreateDbInstance),
        vec!["db2-instance-1", "db2-instance-2"]
    );
    assert_eq!(mock.members("db2"), vec!["db2-instance-1"]);
}

#[tokio::test]
async fn restore_from_missing_snapshot_changes_nothing() {
    let (mock, service) = setup();
    let config = AuroraConfig::new("db2")
        .snapshot_identifier("missing")
        .instance_number(2);

    let aborted = service.aurora(config).restore_from_snapshot().await.unwrap_err();

    assert!(aborted.error.is_snapshot_not_found());
    assert!(!aborted.is_partial());
    assert!(mock.targets(Operation::CreateDbInstance).is_empty());
}

#[tokio::test]
async fn restore_to_pitr_stops_at_first_member() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");
    mock.fail_nth(Operation::CreateDbInstance, 1, throttled());

    let config = AuroraConfig::new("db3")
        .source_cluster_identifier("db1")
        .use_latest_restorable_time(true)
        .instance_number(3);
    let aborted = service.aurora(config).restore_to_pitr().await.unwrap_err();

    assert_eq!(
        aborted.steps,
        vec![Step::RestoreToPointInTime {
            cluster: ClusterId::new("db3"),
            source: ClusterId::new("db1"),
        }]
    );
    assert!(aborted.is_partial());
    assert_eq!(aborted.state, Some(TopologyState::Partial));
    assert_eq!(mock.targets(Operation::CreateDbInstance), vec!["db3-instance-1"]);
    assert!(mock.has_cluster("db3"));
}

#[tokio::test]
async fn restore_to_pitr_reattaches_members() {
    let (mock, service) = setup();
    mock.seed_cluster("db1");

    let config = AuroraConfig::new("db3")
        .source_cluster_identifier("db1")
        .use_latest_restorable_time(true)
        .instance_number(1);
    let applied = service.aurora(config).restore_to_pitr().await.unwrap();

    assert_eq!(applied.created_instances(), vec![&InstanceId::new("db3-instance-1")]);
    assert_eq!(mock.members("db3"), vec!["db3-instance-1"]);
}

// =============================================================================
// Cancellation and deadlines
// =============================================================================

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let mock = Arc::new(MockControlPlane::new());
    let token = CancellationToken::new();
    token.cancel();
    let service = RdsService::with_defaults(Arc::clone(&mock)).with_cancellation(token);

    let aborted = service.aurora(db1(3)).create().await.unwrap_err();

    assert!(matches!(aborted.error, RdsError::Cancelled { .. }));
    assert!(!aborted.is_partial());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_protocol_leaves_partial_topology() {
    let mock = Arc::new(MockControlPlane::new());
    mock.block(Operation::CreateDbInstance);
    let token = CancellationToken::new();
    let service = RdsService::with_defaults(Arc::clone(&mock)).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });
    let aborted = service.aurora(db1(3)).create().await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(aborted.error, RdsError::Cancelled { .. }));
    assert_eq!(
        aborted.failed,
        Step::CreateInstance {
            instance: InstanceId::new("db1-instance-1")
        }
    );
    assert!(aborted.is_partial());
    assert!(mock.has_cluster("db1"));
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_hung_call() {
    let mock = Arc::new(MockControlPlane::new());
    mock.block(Operation::DescribeDbInstances);
    let service = RdsService::new(
        Arc::clone(&mock),
        &RdsConfig {
            call_timeout_seconds: 5,
        },
    );

    let aborted = service.aurora(db1(1)).delete().await.unwrap_err();

    match &aborted.error {
        RdsError::Timeout { after, .. } => assert_eq!(*after, Duration::from_secs(5)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(
        aborted.failed,
        Step::DescribeMembers {
            cluster: ClusterId::new("db1")
        }
    );
    assert!(!aborted.is_partial());
}

// =============================================================================
// Single calls
// =============================================================================

#[tokio::test]
async fn failover_promotes_reader() {
    let (mock, service) = setup();
    service.aurora(db1(2)).create().await.unwrap();

    service
        .aurora(db1(2).failover_target("db1-instance-2"))
        .failover_primary()
        .await
        .unwrap();

    let desc = service.aurora(db1(2)).describe().await.unwrap().unwrap();
    assert_eq!(
        desc.writer().map(|m| m.db_instance_identifier.as_str()),
        Some("db1-instance-2")
    );
    assert_eq!(mock.targets(Operation::FailoverDbCluster), vec!["db1"]);
}

#[tokio::test]
async fn describe_absent_cluster_is_none() {
    let (_mock, service) = setup();
    assert!(service.aurora(db1(1)).describe().await.unwrap().is_none());
}

//! In-memory control plane for tests.
//!
//! [`MockControlPlane`] keeps clusters, instances, and snapshots in memory and
//! emulates the control-plane rules the orchestrator relies on: duplicate
//! identifiers are rejected, absent resources are reported with the matching
//! not-found kind, a cluster cannot be deleted while it has members, and
//! restores produce a cluster shell with no instances.
//!
//! Every call is recorded in order. Tests can inject a failure on the n-th
//! call of an operation, or make an operation hang until cancelled.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::client::{ControlPlane, Operation};
use crate::error::{ApiError, ApiErrorKind, RdsError, Result};
use crate::request::{
    CreateClusterRequest, CreateClusterSnapshotRequest, CreateInstanceRequest,
    DeleteClusterRequest, DeleteInstanceRequest, DescribeClusterSnapshotsRequest,
    DescribeClustersRequest, DescribeInstancesRequest, FailoverClusterRequest,
    FailoverGlobalClusterRequest, Filter, RebootClusterRequest, RebootInstanceRequest,
    RestoreClusterFromSnapshotRequest, RestoreClusterPitrRequest, RestoreInstancePitrRequest,
    CLUSTER_ID_FILTER,
};
use crate::types::{ClusterMember, DescCluster, DescClusterSnapshot, DescInstance, Endpoint};

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The verb that was called.
    pub operation: Operation,
    /// The primary identifier the call addressed (empty for unscoped describes).
    pub target: String,
}

struct Fault {
    operation: Operation,
    nth: usize,
    error: ApiError,
}

struct MockCluster {
    desc: DescCluster,
    engine: String,
    writer: Option<String>,
}

#[derive(Default)]
struct State {
    clusters: BTreeMap<String, MockCluster>,
    instances: BTreeMap<String, DescInstance>,
    snapshots: BTreeMap<String, DescClusterSnapshot>,
    calls: Vec<Call>,
    counts: HashMap<Operation, usize>,
    faults: Vec<Fault>,
    blocked: HashSet<Operation>,
}

impl State {
    fn members_of(&self, cluster: &str) -> Vec<String> {
        self.instances
            .values()
            .filter(|i| i.db_cluster_identifier == cluster)
            .map(|i| i.db_instance_identifier.clone())
            .collect()
    }

    fn describe_cluster(&self, cluster: &MockCluster) -> DescCluster {
        let mut desc = cluster.desc.clone();
        desc.members = self
            .members_of(&desc.db_cluster_identifier)
            .into_iter()
            .map(|id| ClusterMember {
                is_cluster_writer: cluster.writer.as_deref() == Some(id.as_str()),
                db_instance_identifier: id,
                db_cluster_parameter_group_status: "in-sync".to_string(),
            })
            .collect();
        desc
    }

    fn add_cluster(&mut self, id: &str, engine: Option<&str>) {
        self.clusters.insert(
            id.to_string(),
            MockCluster {
                desc: DescCluster {
                    db_cluster_identifier: id.to_string(),
                    db_cluster_arn: format!("arn:aws:rds:mock:000000000000:cluster:{id}"),
                    status: "available".to_string(),
                    primary_endpoint: format!("{id}.cluster-mock.rds.local"),
                    reader_endpoint: format!("{id}.cluster-ro-mock.rds.local"),
                    port: default_port(engine),
                    cluster_create_time: Some(Utc::now()),
                    ..DescCluster::default()
                },
                engine: engine.unwrap_or_default().to_string(),
                writer: None,
            },
        );
    }

    fn add_snapshot(&mut self, id: &str, cluster: &str) {
        let engine = self
            .clusters
            .get(cluster)
            .map(|c| c.engine.clone())
            .unwrap_or_default();
        self.snapshots.insert(
            id.to_string(),
            DescClusterSnapshot {
                db_cluster_snapshot_identifier: id.to_string(),
                db_cluster_identifier: cluster.to_string(),
                db_cluster_snapshot_arn: format!(
                    "arn:aws:rds:mock:000000000000:cluster-snapshot:{id}"
                ),
                status: "available".to_string(),
                engine,
                snapshot_type: "manual".to_string(),
                percent_progress: 100,
                snapshot_create_time: Some(Utc::now()),
                ..DescClusterSnapshot::default()
            },
        );
    }
}

fn default_port(engine: Option<&str>) -> i32 {
    match engine {
        Some(e) if e.contains("postgres") => 5432,
        _ => 3306,
    }
}

fn cluster_filter(filters: &[Filter]) -> Option<&[String]> {
    filters
        .iter()
        .find(|f| f.name == CLUSTER_ID_FILTER)
        .map(|f| f.values.as_slice())
}

fn cluster_not_found(id: &str) -> RdsError {
    ApiError::new(
        ApiErrorKind::ClusterNotFound,
        "DBClusterNotFoundFault",
        format!("DBCluster {id} not found."),
    )
    .into()
}

fn instance_not_found(id: &str) -> RdsError {
    ApiError::new(
        ApiErrorKind::InstanceNotFound,
        "DBInstanceNotFound",
        format!("DBInstance {id} not found."),
    )
    .into()
}

fn snapshot_not_found(id: &str) -> RdsError {
    ApiError::new(
        ApiErrorKind::SnapshotNotFound,
        "DBClusterSnapshotNotFoundFault",
        format!("DBClusterSnapshot {id} not found."),
    )
    .into()
}

fn already_exists(code: &str, id: &str) -> RdsError {
    ApiError::new(
        ApiErrorKind::AlreadyExists,
        code,
        format!("{id} already exists"),
    )
    .into()
}

/// A control plane that keeps its resources in memory.
#[derive(Default)]
pub struct MockControlPlane {
    state: Mutex<State>,
}

impl MockControlPlane {
    /// Create an empty mock control plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` call (1-based) of `operation` with `error`.
    ///
    /// Calls are counted from the creation of the mock, not from the time the
    /// fault is registered.
    pub fn fail_nth(&self, operation: Operation, nth: usize, error: ApiError) {
        self.state.lock().faults.push(Fault {
            operation,
            nth,
            error,
        });
    }

    /// Make every call of `operation` hang until it is cancelled or times out.
    pub fn block(&self, operation: Operation) {
        self.state.lock().blocked.insert(operation);
    }

    /// Add an existing cluster without recording a call.
    pub fn seed_cluster(&self, id: &str) {
        self.state.lock().add_cluster(id, None);
    }

    /// Add an existing instance without recording a call.
    pub fn seed_instance(&self, id: &str, cluster: Option<&str>) {
        let mut state = self.state.lock();
        if let Some(cluster) = cluster {
            if let Some(c) = state.clusters.get_mut(cluster) {
                c.writer.get_or_insert_with(|| id.to_string());
            }
        }
        state.instances.insert(
            id.to_string(),
            DescInstance {
                db_instance_identifier: id.to_string(),
                db_instance_status: "available".to_string(),
                db_cluster_identifier: cluster.unwrap_or_default().to_string(),
                ..DescInstance::default()
            },
        );
    }

    /// Add an existing snapshot without recording a call.
    pub fn seed_snapshot(&self, id: &str, cluster: &str) {
        self.state.lock().add_snapshot(id, cluster);
    }

    /// All recorded calls, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Targets of the recorded calls of one operation, in order.
    #[must_use]
    pub fn targets(&self, operation: Operation) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.target.clone())
            .collect()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Forget the recorded calls. Fault counters are kept.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns true if the cluster exists.
    #[must_use]
    pub fn has_cluster(&self, id: &str) -> bool {
        self.state.lock().clusters.contains_key(id)
    }

    /// Returns true if the snapshot exists.
    #[must_use]
    pub fn has_snapshot(&self, id: &str) -> bool {
        self.state.lock().snapshots.contains_key(id)
    }

    /// Identifiers of the instances attached to a cluster, sorted.
    #[must_use]
    pub fn members(&self, cluster: &str) -> Vec<String> {
        self.state.lock().members_of(cluster)
    }

    /// Identifiers of all instances, sorted.
    #[must_use]
    pub fn instance_ids(&self) -> Vec<String> {
        self.state.lock().instances.keys().cloned().collect()
    }

    async fn enter(&self, operation: Operation, target: &str) -> Result<()> {
        let blocked = {
            let mut state = self.state.lock();
            state.calls.push(Call {
                operation,
                target: target.to_string(),
            });
            let count = state.counts.entry(operation).or_default();
            *count += 1;
            let nth = *count;
            if let Some(pos) = state
                .faults
                .iter()
                .position(|f| f.operation == operation && f.nth == nth)
            {
                let fault = state.faults.remove(pos);
                return Err(fault.error.into());
            }
            state.blocked.contains(&operation)
        };
        if blocked {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn create_db_cluster(&self, req: &CreateClusterRequest) -> Result<()> {
        let id = req.db_cluster_identifier.as_str();
        self.enter(Operation::CreateDbCluster, id).await?;

        let mut state = self.state.lock();
        if state.clusters.contains_key(id) {
            return Err(already_exists("DBClusterAlreadyExistsFault", id));
        }
        state.add_cluster(id, req.engine.as_deref());
        if let Some(c) = state.clusters.get_mut(id) {
            c.desc.availability_zones.clone_from(&req.availability_zones);
        }
        Ok(())
    }

    async fn delete_db_cluster(&self, req: &DeleteClusterRequest) -> Result<()> {
        let id = req.db_cluster_identifier.as_str();
        self.enter(Operation::DeleteDbCluster, id).await?;

        let mut state = self.state.lock();
        if !state.clusters.contains_key(id) {
            return Err(cluster_not_found(id));
        }
        if !state.members_of(id).is_empty() {
            return Err(ApiError::new(
                ApiErrorKind::InvalidState,
                "InvalidDBClusterStateFault",
                format!("Cluster {id} still has member instances"),
            )
            .into());
        }
        if !req.skip_final_snapshot {
            let Some(snapshot) = &req.final_db_snapshot_identifier else {
                return Err(ApiError::new(
                    ApiErrorKind::InvalidParameter,
                    "InvalidParameterCombination",
                    "FinalDBSnapshotIdentifier is required unless SkipFinalSnapshot is specified",
                )
                .into());
            };
            state.add_snapshot(snapshot.as_str(), id);
        }
        state.clusters.remove(id);
        Ok(())
    }

    async fn reboot_db_cluster(&self, req: &RebootClusterRequest) -> Result<()> {
        let id = req.db_cluster_identifier.as_str();
        self.enter(Operation::RebootDbCluster, id).await?;

        if self.state.lock().clusters.contains_key(id) {
            Ok(())
        } else {
            Err(cluster_not_found(id))
        }
    }

    async fn failover_db_cluster(&self, req: &FailoverClusterRequest) -> Result<()> {
        let id = req.db_cluster_identifier.as_str();
        self.enter(Operation::FailoverDbCluster, id).await?;

        let mut state = self.state.lock();
        let members = state.members_of(id);
        let Some(cluster) = state.clusters.get_mut(id) else {
            return Err(cluster_not_found(id));
        };
        let target = match &req.target_db_instance_identifier {
            Some(target) if members.iter().any(|m| m == target.as_str()) => target.to_string(),
            Some(target) => {
                return Err(ApiError::new(
                    ApiErrorKind::InvalidParameter,
                    "InvalidParameterValue",
                    format!("{target} is not a member of {id}"),
                )
                .into())
            }
            None => members
                .into_iter()
                .find(|m| cluster.writer.as_deref() != Some(m.as_str()))
                .ok_or_else(|| {
                    RdsError::from(ApiError::new(
                        ApiErrorKind::InvalidState,
                        "InvalidDBClusterStateFault",
                        format!("Cluster {id} has no reader to promote"),
                    ))
                })?,
        };
        cluster.writer = Some(target);
        Ok(())
    }

    async fn failover_global_cluster(&self, req: &FailoverGlobalClusterRequest) -> Result<()> {
        self.enter(Operation::FailoverGlobalCluster, &req.global_cluster_identifier)
            .await
    }

    async fn describe_db_clusters(&self, req: &DescribeClustersRequest) -> Result<Vec<DescCluster>> {
        let target = req
            .db_cluster_identifier
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        self.enter(Operation::DescribeDbClusters, &target).await?;

        let state = self.state.lock();
        if let Some(id) = &req.db_cluster_identifier {
            return state
                .clusters
                .get(id.as_str())
                .map(|c| vec![state.describe_cluster(c)])
                .ok_or_else(|| cluster_not_found(id.as_str()));
        }
        let wanted = cluster_filter(&req.filters);
        Ok(state
            .clusters
            .values()
            .filter(|c| wanted.map_or(true, |w| w.contains(&c.desc.db_cluster_identifier)))
            .map(|c| state.describe_cluster(c))
            .collect())
    }

    async fn restore_db_cluster_from_snapshot(
        &self,
        req: &RestoreClusterFromSnapshotRequest,
    ) -> Result<()> {
        let id = req.db_cluster_identifier.as_str();
        self.enter(Operation::RestoreDbClusterFromSnapshot, id).await?;

        let mut state = self.state.lock();
        if !state.snapshots.contains_key(req.snapshot_identifier.as_str()) {
            return Err(snapshot_not_found(req.snapshot_identifier.as_str()));
        }
        if state.clusters.contains_key(id) {
            return Err(already_exists("DBClusterAlreadyExistsFault", id));
        }
        state.add_cluster(id, req.engine.as_deref());
        Ok(())
    }

    async fn restore_db_cluster_to_point_in_time(
        &self,
        req: &RestoreClusterPitrRequest,
    ) -> Result<()> {
        let id = req.db_cluster_identifier.as_str();
        self.enter(Operation::RestoreDbClusterToPointInTime, id).await?;

        let mut state = self.state.lock();
        let source = req.source_db_cluster_identifier.as_str();
        if !state.clusters.contains_key(source) {
            return Err(cluster_not_found(source));
        }
        if state.clusters.contains_key(id) {
            return Err(already_exists("DBClusterAlreadyExistsFault", id));
        }
        state.add_cluster(id, None);
        Ok(())
    }

    async fn create_db_cluster_snapshot(&self, req: &CreateClusterSnapshotRequest) -> Result<()> {
        let id = req.db_cluster_snapshot_identifier.as_str();
        self.enter(Operation::CreateDbClusterSnapshot, id).await?;

        let mut state = self.state.lock();
        let cluster = req.db_cluster_identifier.as_str();
        if !state.clusters.contains_key(cluster) {
            return Err(cluster_not_found(cluster));
        }
        if state.snapshots.contains_key(id) {
            return Err(already_exists("DBClusterSnapshotAlreadyExistsFault", id));
        }
        state.add_snapshot(id, cluster);
        Ok(())
    }

    async fn describe_db_cluster_snapshots(
        &self,
        req: &DescribeClusterSnapshotsRequest,
    ) -> Result<Vec<DescClusterSnapshot>> {
        let target = req
            .db_cluster_snapshot_identifier
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        self.enter(Operation::DescribeDbClusterSnapshots, &target)
            .await?;

        let state = self.state.lock();
        if let Some(id) = &req.db_cluster_snapshot_identifier {
            return state
                .snapshots
                .get(id.as_str())
                .map(|s| vec![s.clone()])
                .ok_or_else(|| snapshot_not_found(id.as_str()));
        }
        Ok(state
            .snapshots
            .values()
            .filter(|s| {
                req.db_cluster_identifier
                    .as_ref()
                    .map_or(true, |c| s.db_cluster_identifier == c.as_str())
            })
            .cloned()
            .collect())
    }

    async fn create_db_instance(&self, req: &CreateInstanceRequest) -> Result<()> {
        let id = req.db_instance_identifier.as_str();
        self.enter(Operation::CreateDbInstance, id).await?;

        let mut state = self.state.lock();
        if state.instances.contains_key(id) {
            return Err(already_exists("DBInstanceAlreadyExists", id));
        }
        let cluster = req
            .db_cluster_identifier
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        if !cluster.is_empty() {
            let Some(c) = state.clusters.get_mut(&cluster) else {
                return Err(cluster_not_found(&cluster));
            };
            c.writer.get_or_insert_with(|| id.to_string());
        }
        state.instances.insert(
            id.to_string(),
            DescInstance {
                db_instance_identifier: id.to_string(),
                db_instance_arn: format!("arn:aws:rds:mock:000000000000:db:{id}"),
                db_instance_status: "available".to_string(),
                db_cluster_identifier: cluster,
                endpoint: Endpoint {
                    address: format!("{id}.mock.rds.local"),
                    port: default_port(req.engine.as_deref()),
                },
                instance_create_time: Some(Utc::now()),
                ..DescInstance::default()
            },
        );
        Ok(())
    }

    async fn delete_db_instance(&self, req: &DeleteInstanceRequest) -> Result<()> {
        let id = req.db_instance_identifier.as_str();
        self.enter(Operation::DeleteDbInstance, id).await?;

        let mut state = self.state.lock();
        let Some(removed) = state.instances.remove(id) else {
            return Err(instance_not_found(id));
        };
        let cluster = removed.db_cluster_identifier;
        let next_writer = state.members_of(&cluster).into_iter().next();
        if let Some(c) = state.clusters.get_mut(&cluster) {
            if c.writer.as_deref() == Some(id) {
                c.writer = next_writer;
            }
        }
        Ok(())
    }

    async fn reboot_db_instance(&self, req: &RebootInstanceRequest) -> Result<()> {
        let id = req.db_instance_identifier.as_str();
        self.enter(Operation::RebootDbInstance, id).await?;

        if self.state.lock().instances.contains_key(id) {
            Ok(())
        } else {
            Err(instance_not_found(id))
        }
    }

    async fn describe_db_instances(
        &self,
        req: &DescribeInstancesRequest,
    ) -> Result<Vec<DescInstance>> {
        let target = match (&req.db_instance_identifier, cluster_filter(&req.filters)) {
            (Some(id), _) => id.to_string(),
            (None, Some(values)) => values.join(","),
            (None, None) => String::new(),
        };
        self.enter(Operation::DescribeDbInstances, &target).await?;

        let state = self.state.lock();
        if let Some(id) = &req.db_instance_identifier {
            return state
                .instances
                .get(id.as_str())
                .map(|i| vec![i.clone()])
                .ok_or_else(|| instance_not_found(id.as_str()));
        }
        let wanted = cluster_filter(&req.filters);
        Ok(state
            .instances
            .values()
            .filter(|i| wanted.map_or(true, |w| w.contains(&i.db_cluster_identifier)))
            .cloned()
            .collect())
    }

    async fn restore_db_instance_to_point_in_time(
        &self,
        req: &RestoreInstancePitrRequest,
    ) -> Result<()> {
        let id = req.target_db_instance_identifier.as_str();
        self.enter(Operation::RestoreDbInstanceToPointInTime, id)
            .await?;

        let mut state = self.state.lock();
        if let Some(source) = &req.source_db_instance_identifier {
            if !state.instances.contains_key(source.as_str()) {
                return Err(instance_not_found(source.as_str()));
            }
        }
        if state.instances.contains_key(id) {
            return Err(already_exists("DBInstanceAlreadyExists", id));
        }
        state.instances.insert(
            id.to_string(),
            DescInstance {
                db_instance_identifier: id.to_string(),
                db_instance_status: "creating".to_string(),
                instance_create_time: Some(Utc::now()),
                ..DescInstance::default()
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmesh_core::{ClusterId, InstanceId};

    fn create_instance(id: &str, cluster: &str) -> CreateInstanceRequest {
        CreateInstanceRequest {
            db_instance_identifier: InstanceId::new(id),
            db_instance_class: Some("db.t3.medium".to_string()),
            engine: Some("aurora-mysql".to_string()),
            engine_version: None,
            db_cluster_identifier: Some(ClusterId::new(cluster)),
            master_username: None,
            master_user_password: None,
            manage_master_user_password: None,
            allocated_storage: None,
            iops: None,
            db_name: None,
            vpc_security_group_ids: Vec::new(),
            db_subnet_group_name: None,
            multi_az: None,
            availability_zone: None,
            publicly_accessible: None,
            license_model: None,
        }
    }

    #[tokio::test]
    async fn cluster_with_members_cannot_be_deleted() {
        let mock = MockControlPlane::new();
        mock.seed_cluster("db1");
        mock.create_db_instance(&create_instance("db1-instance-1", "db1"))
            .await
            .unwrap();

        let err = mock
            .delete_db_cluster(&DeleteClusterRequest {
                db_cluster_identifier: ClusterId::new("db1"),
                skip_final_snapshot: true,
                final_db_snapshot_identifier: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::InvalidState));
        assert!(mock.has_cluster("db1"));
    }

    #[tokio::test]
    async fn first_member_is_writer() {
        let mock = MockControlPlane::new();
        mock.seed_cluster("db1");
        for id in ["db1-instance-1", "db1-instance-2"] {
            mock.create_db_instance(&create_instance(id, "db1")).await.unwrap();
        }

        let clusters = mock
            .describe_db_clusters(&DescribeClustersRequest {
                db_cluster_identifier: Some(ClusterId::new("db1")),
                filters: Vec::new(),
            })
            .await
            .unwrap();
        let writer = clusters[0].writer().unwrap();
        assert_eq!(writer.db_instance_identifier, "db1-instance-1");
    }

    #[tokio::test]
    async fn nth_fault_fires_once() {
        let mock = MockControlPlane::new();
        mock.seed_cluster("db1");
        mock.fail_nth(
            Operation::CreateDbInstance,
            2,
            ApiError::new(ApiErrorKind::QuotaExceeded, "InstanceQuotaExceeded", "quota"),
        );

        assert!(mock.create_db_instance(&create_instance("a", "db1")).await.is_ok());
        let err = mock
            .create_db_instance(&create_instance("b", "db1"))
            .await
            .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::QuotaExceeded));
        assert!(mock.create_db_instance(&create_instance("b", "db1")).await.is_ok());

        assert_eq!(
            mock.targets(Operation::CreateDbInstance),
            vec!["a".to_string(), "b".to_string(), "b".to_string()]
        );
        assert_eq!(mock.members("db1"), vec!["a".to_string(), "b".to_string()]);
    }
}

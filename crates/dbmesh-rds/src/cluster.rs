//! Cluster lifecycle manager.
//!
//! [`ClusterConfig`] is an immutable description of one cluster. Each verb has
//! a pure mapping function that extracts exactly the fields the verb needs;
//! [`ClusterManager`] issues the resulting single control-plane call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbmesh_core::{ClusterId, InstanceId, SnapshotId};
use serde::{Deserialize, Serialize};

use crate::client::{CallGuard, ControlPlane, Operation};
use crate::error::{RdsError, Result};
use crate::request::{
    CreateClusterRequest, CreateClusterSnapshotRequest, DeleteClusterRequest,
    DescribeClusterSnapshotsRequest, DescribeClustersRequest, DescribeInstancesRequest,
    FailoverClusterRequest, FailoverGlobalClusterRequest, Filter, RebootClusterRequest,
    RestoreClusterFromSnapshotRequest, RestoreClusterPitrRequest, RestoreType, CLUSTER_ID_FILTER,
};
use crate::types::{DescCluster, DescClusterSnapshot, DescInstance};

/// Configuration of a single cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Identifier of the cluster.
    pub id: ClusterId,
    /// Engine name, e.g. `aurora-mysql`.
    #[serde(default)]
    pub engine: Option<String>,
    /// Engine version.
    #[serde(default)]
    pub engine_version: Option<String>,
    /// Engine mode.
    #[serde(default)]
    pub engine_mode: Option<String>,
    /// Master user name.
    #[serde(default)]
    pub master_username: Option<String>,
    /// Master user password.
    #[serde(default, skip_serializing)]
    pub master_user_password: Option<String>,
    /// Let the control plane manage the master password.
    #[serde(default)]
    pub manage_master_user_password: Option<bool>,
    /// Name of the initial database.
    #[serde(default)]
    pub database_name: Option<String>,
    /// VPC security groups.
    #[serde(default)]
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group.
    #[serde(default)]
    pub db_subnet_group_name: Option<String>,
    /// Availability zones.
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Allocated storage in GiB.
    #[serde(default)]
    pub allocated_storage: Option<i32>,
    /// Storage type.
    #[serde(default)]
    pub storage_type: Option<String>,
    /// Provisioned IOPS.
    #[serde(default)]
    pub iops: Option<i32>,
    /// Compute class for clusters that own their compute.
    #[serde(default)]
    pub db_cluster_instance_class: Option<String>,
    /// Public accessibility.
    #[serde(default)]
    pub publicly_accessible: Option<bool>,
    /// Skip the final snapshot on delete.
    #[serde(default)]
    pub skip_final_snapshot: bool,
    /// Final snapshot taken on delete.
    #[serde(default)]
    pub final_snapshot_identifier: Option<SnapshotId>,
    /// Snapshot addressed by the snapshot verbs and restore-from-snapshot.
    #[serde(default)]
    pub snapshot_identifier: Option<SnapshotId>,
    /// Source cluster of a point-in-time restore.
    #[serde(default)]
    pub source_cluster_identifier: Option<ClusterId>,
    /// Point-in-time restore target.
    #[serde(default)]
    pub restore_to_time: Option<DateTime<Utc>>,
    /// Restore to the latest restorable time.
    #[serde(default)]
    pub use_latest_restorable_time: bool,
    /// Point-in-time restore type.
    #[serde(default)]
    pub restore_type: Option<RestoreType>,
    /// Backtrack window in seconds.
    #[serde(default)]
    pub backtrack_window: Option<i64>,
    /// Instance promoted by a failover.
    #[serde(default)]
    pub failover_target: Option<InstanceId>,
    /// Global cluster addressed by a global failover.
    #[serde(default)]
    pub global_cluster_identifier: Option<String>,
    /// Secondary cluster promoted by a global failover.
    #[serde(default)]
    pub global_failover_target: Option<String>,
    /// Extra filters for member enumeration.
    #[serde(default)]
    pub instance_filters: Vec<Filter>,
}

impl ClusterConfig {
    /// Create a configuration for the given cluster with nothing else set.
    #[must_use]
    pub fn new(id: impl Into<ClusterId>) -> Self {
        Self {
            id: id.into(),
            engine: None,
            engine_version: None,
            engine_mode: None,
            master_username: None,
            master_user_password: None,
            manage_master_user_password: None,
            database_name: None,
            vpc_security_group_ids: Vec::new(),
            db_subnet_group_name: None,
            availability_zones: Vec::new(),
            allocated_storage: None,
            storage_type: None,
            iops: None,
            db_cluster_instance_class: None,
            publicly_accessible: None,
            skip_final_snapshot: false,
            final_snapshot_identifier: None,
            snapshot_identifier: None,
            source_cluster_identifier: None,
            restore_to_time: None,
            use_latest_restorable_time: false,
            restore_type: None,
            backtrack_window: None,
            failover_target: None,
            global_cluster_identifier: None,
            global_failover_target: None,
            instance_filters: Vec::new(),
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Set the engine.
    #[must_use]
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Set the engine version.
    #[must_use]
    pub fn engine_version(mut self, version: impl Into<String>) -> Self {
        self.engine_version = Some(version.into());
        self
    }

    /// Set the engine mode.
    #[must_use]
    pub fn engine_mode(mut self, mode: impl Into<String>) -> Self {
        self.engine_mode = Some(mode.into());
        self
    }

    /// Set the master user name.
    #[must_use]
    pub fn master_username(mut self, user: impl Into<String>) -> Self {
        self.master_username = Some(user.into());
        self
    }

    /// Set the master user password.
    #[must_use]
    pub fn master_user_password(mut self, password: impl Into<String>) -> Self {
        self.master_user_password = Some(password.into());
        self
    }

    /// Let the control plane generate and manage the master password.
    #[must_use]
    pub const fn manage_master_user_password(mut self, enable: bool) -> Self {
        self.manage_master_user_password = Some(enable);
        self
    }

    /// Set the initial database name.
    #[must_use]
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Set the VPC security groups.
    #[must_use]
    pub fn vpc_security_group_ids(mut self, ids: Vec<String>) -> Self {
        self.vpc_security_group_ids = ids;
        self
    }

    /// Set the subnet group.
    #[must_use]
    pub fn db_subnet_group_name(mut self, name: impl Into<String>) -> Self {
        self.db_subnet_group_name = Some(name.into());
        self
    }

    /// Set the availability zones.
    #[must_use]
    pub fn availability_zones(mut self, zones: Vec<String>) -> Self {
        self.availability_zones = zones;
        self
    }

    /// Set the allocated storage in GiB.
    #[must_use]
    pub const fn allocated_storage(mut self, gib: i32) -> Self {
        self.allocated_storage = Some(gib);
        self
    }

    /// Set the storage type.
    #[must_use]
    pub fn storage_type(mut self, storage_type: impl Into<String>) -> Self {
        self.storage_type = Some(storage_type.into());
        self
    }

    /// Set the provisioned IOPS.
    #[must_use]
    pub const fn iops(mut self, iops: i32) -> Self {
        self.iops = Some(iops);
        self
    }

    /// Set the cluster compute class.
    #[must_use]
    pub fn db_cluster_instance_class(mut self, class: impl Into<String>) -> Self {
        self.db_cluster_instance_class = Some(class.into());
        self
    }

    /// Set public accessibility.
    #[must_use]
    pub const fn publicly_accessible(mut self, enable: bool) -> Self {
        self.publicly_accessible = Some(enable);
        self
    }

    /// Skip the final snapshot on delete.
    #[must_use]
    pub const fn skip_final_snapshot(mut self, skip: bool) -> Self {
        self.skip_final_snapshot = skip;
        self
    }

    /// Name the final snapshot taken on delete.
    #[must_use]
    pub fn final_snapshot_identifier(mut self, id: impl Into<SnapshotId>) -> Self {
        self.final_snapshot_identifier = Some(id.into());
        self
    }

    /// Set the snapshot addressed by snapshot verbs and restores.
    #[must_use]
    pub fn snapshot_identifier(mut self, id: impl Into<SnapshotId>) -> Self {
        self.snapshot_identifier = Some(id.into());
        self
    }

    /// Set the source cluster of a point-in-time restore.
    #[must_use]
    pub fn source_cluster_identifier(mut self, id: impl Into<ClusterId>) -> Self {
        self.source_cluster_identifier = Some(id.into());
        self
    }

    /// Set the point-in-time restore target.
    #[must_use]
    pub const fn restore_to_time(mut self, at: DateTime<Utc>) -> Self {
        self.restore_to_time = Some(at);
        self
    }

    /// Restore to the latest restorable time.
    #[must_use]
    pub const fn use_latest_restorable_time(mut self, enable: bool) -> Self {
        self.use_latest_restorable_time = enable;
        self
    }

    /// Set the point-in-time restore type.
    #[must_use]
    pub const fn restore_type(mut self, restore_type: RestoreType) -> Self {
        self.restore_type = Some(restore_type);
        self
    }

    /// Set the backtrack window in seconds.
    #[must_use]
    pub const fn backtrack_window(mut self, seconds: i64) -> Self {
        self.backtrack_window = Some(seconds);
        self
    }

    /// Set the instance promoted by a failover.
    #[must_use]
    pub fn failover_target(mut self, id: impl Into<InstanceId>) -> Self {
        self.failover_target = Some(id.into());
        self
    }

    /// Set the global cluster and the secondary promoted by a global failover.
    #[must_use]
    pub fn global_failover(mut self, global: impl Into<String>, target: impl Into<String>) -> Self {
        self.global_cluster_identifier = Some(global.into());
        self.global_failover_target = Some(target.into());
        self
    }

    /// Add a filter for member enumeration.
    #[must_use]
    pub fn instance_filter(mut self, filter: Filter) -> Self {
        self.instance_filters.push(filter);
        self
    }

    // =========================================================================
    // Mapping
    // =========================================================================

    /// Map to a create request.
    #[must_use]
    pub fn create_request(&self) -> CreateClusterRequest {
        CreateClusterRequest {
            db_cluster_identifier: self.id.clone(),
            engine: self.engine.clone(),
            engine_version: self.engine_version.clone(),
            engine_mode: self.engine_mode.clone(),
            master_username: self.master_username.clone(),
            master_user_password: self.master_user_password.clone(),
            manage_master_user_password: self.manage_master_user_password,
            database_name: self.database_name.clone(),
            vpc_security_group_ids: self.vpc_security_group_ids.clone(),
            db_subnet_group_name: self.db_subnet_group_name.clone(),
            availability_zones: self.availability_zones.clone(),
            allocated_storage: self.allocated_storage,
            storage_type: self.storage_type.clone(),
            iops: self.iops,
            db_cluster_instance_class: self.db_cluster_instance_class.clone(),
            publicly_accessible: self.publicly_accessible,
        }
    }

    /// Map to a delete request.
    #[must_use]
    pub fn delete_request(&self) -> DeleteClusterRequest {
        DeleteClusterRequest {
            db_cluster_identifier: self.id.clone(),
            skip_final_snapshot: self.skip_final_snapshot,
            final_db_snapshot_identifier: self.final_snapshot_identifier.clone(),
        }
    }

    /// Map to a reboot request.
    #[must_use]
    pub fn reboot_request(&self) -> RebootClusterRequest {
        RebootClusterRequest {
            db_cluster_identifier: self.id.clone(),
        }
    }

    /// Map to a failover request.
    #[must_use]
    pub fn failover_request(&self) -> FailoverClusterRequest {
        FailoverClusterRequest {
            db_cluster_identifier: self.id.clone(),
            target_db_instance_identifier: self.failover_target.clone(),
        }
    }

    /// Map to a global failover request.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if the global cluster or its target is unset.
    pub fn failover_global_request(&self) -> Result<FailoverGlobalClusterRequest> {
        Ok(FailoverGlobalClusterRequest {
            global_cluster_identifier: required(
                self.global_cluster_identifier.clone(),
                "global cluster identifier",
            )?,
            target_db_cluster_identifier: required(
                self.global_failover_target.clone(),
                "global failover target",
            )?,
        })
    }

    /// Map to a describe request for this cluster.
    #[must_use]
    pub fn describe_request(&self) -> DescribeClustersRequest {
        DescribeClustersRequest {
            db_cluster_identifier: Some(self.id.clone()),
            filters: Vec::new(),
        }
    }

    /// Map to a describe-instances request that enumerates the members.
    ///
    /// A caller-provided `db-cluster-id` filter is reused with its values
    /// replaced by this cluster's identifier; otherwise one is appended.
    #[must_use]
    pub fn members_request(&self) -> DescribeInstancesRequest {
        let mut filters = self.instance_filters.clone();
        let members = Filter::cluster_members(&self.id);
        match filters.iter_mut().find(|f| f.name == CLUSTER_ID_FILTER) {
            Some(existing) => existing.values = members.values,
            None => filters.push(members),
        }
        DescribeInstancesRequest {
            db_instance_identifier: None,
            filters,
        }
    }

    /// Map to a restore-from-snapshot request.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if no snapshot identifier is set.
    pub fn restore_from_snapshot_request(&self) -> Result<RestoreClusterFromSnapshotRequest> {
        Ok(RestoreClusterFromSnapshotRequest {
            db_cluster_identifier: self.id.clone(),
            snapshot_identifier: self.required_snapshot()?,
            engine: self.engine.clone(),
            engine_version: self.engine_version.clone(),
            vpc_security_group_ids: self.vpc_security_group_ids.clone(),
            db_subnet_group_name: self.db_subnet_group_name.clone(),
            availability_zones: self.availability_zones.clone(),
            publicly_accessible: self.publicly_accessible,
        })
    }

    /// Map to a point-in-time restore request.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if no source cluster is set.
    pub fn restore_pitr_request(&self) -> Result<RestoreClusterPitrRequest> {
        Ok(RestoreClusterPitrRequest {
            db_cluster_identifier: self.id.clone(),
            source_db_cluster_identifier: required(
                self.source_cluster_identifier.clone(),
                "source cluster identifier",
            )?,
            restore_to_time: self.restore_to_time,
            use_latest_restorable_time: self.use_latest_restorable_time,
            restore_type: self.restore_type,
            backtrack_window: self.backtrack_window,
            vpc_security_group_ids: self.vpc_security_group_ids.clone(),
            db_subnet_group_name: self.db_subnet_group_name.clone(),
            db_cluster_instance_class: self.db_cluster_instance_class.clone(),
            iops: self.iops,
            publicly_accessible: self.publicly_accessible,
        })
    }

    /// Map to a create-snapshot request.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if no snapshot identifier is set.
    pub fn create_snapshot_request(&self) -> Result<CreateClusterSnapshotRequest> {
        Ok(CreateClusterSnapshotRequest {
            db_cluster_identifier: self.id.clone(),
            db_cluster_snapshot_identifier: self.required_snapshot()?,
        })
    }

    /// Map to a describe-snapshot request.
    ///
    /// The lookup is by snapshot identifier alone; the control plane rejects
    /// a cluster identifier combined with a snapshot identifier.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if no snapshot identifier is set.
    pub fn describe_snapshot_request(&self) -> Result<DescribeClusterSnapshotsRequest> {
        Ok(DescribeClusterSnapshotsRequest {
            db_cluster_identifier: None,
            db_cluster_snapshot_identifier: Some(self.required_snapshot()?),
        })
    }

    fn required_snapshot(&self) -> Result<SnapshotId> {
        required(self.snapshot_identifier.clone(), "snapshot identifier")
    }
}

pub(crate) fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| RdsError::Validation(format!("{what} is required")))
}

/// Single-resource operations on a cluster.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// The configuration this manager operates on.
    fn config(&self) -> &ClusterConfig;

    /// Create the cluster shell.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn create(&self) -> Result<()>;

    /// Delete the cluster. An absent cluster counts as deleted.
    ///
    /// # Errors
    ///
    /// Surfaces any rejection other than cluster-not-found.
    async fn delete(&self) -> Result<()>;

    /// Reboot the cluster.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn reboot(&self) -> Result<()>;

    /// Describe the cluster, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Surfaces any rejection other than cluster-not-found.
    async fn describe(&self) -> Result<Option<DescCluster>>;

    /// List the member instances.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn members(&self) -> Result<Vec<DescInstance>>;

    /// Fail over to the configured target, or a control-plane chosen reader.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn failover(&self) -> Result<()>;

    /// Fail the configured global cluster over to its configured secondary.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when either identifier is unset, and
    /// surfaces any control-plane rejection.
    async fn failover_global(&self) -> Result<()>;

    /// Restore this cluster shell to a point in time of the source cluster.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when no source cluster is set, and
    /// surfaces any control-plane rejection.
    async fn restore_to_pitr(&self) -> Result<()>;

    /// Restore this cluster shell from the configured snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when no snapshot is set, and surfaces
    /// any control-plane rejection.
    async fn restore_from_snapshot(&self) -> Result<()>;

    /// Take the configured snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when no snapshot is set, and surfaces
    /// any control-plane rejection.
    async fn create_snapshot(&self) -> Result<()>;

    /// Describe the configured snapshot, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when no snapshot is set, and surfaces
    /// any rejection other than snapshot-not-found.
    async fn describe_snapshot(&self) -> Result<Option<DescClusterSnapshot>>;
}

/// Issues cluster verbs against a control plane.
pub struct ClusterManager<C: ControlPlane> {
    client: Arc<C>,
    guard: CallGuard,
    config: ClusterConfig,
}

impl<C: ControlPlane> ClusterManager<C> {
    /// Create a manager for one cluster configuration.
    #[must_use]
    pub const fn new(client: Arc<C>, guard: CallGuard, config: ClusterConfig) -> Self {
        Self {
            client,
            guard,
            config,
        }
    }

    /// The cluster this manager addresses.
    #[must_use]
    pub const fn id(&self) -> &ClusterId {
        &self.config.id
    }
}

#[async_trait]
impl<C: ControlPlane + 'static> Cluster for ClusterManager<C> {
    fn config(&self) -> &ClusterConfig {
        &self.config
    }

    async fn create(&self) -> Result<()> {
        let req = self.config.create_request();
        self.guard
            .run(Operation::CreateDbCluster, self.client.create_db_cluster(&req))
            .await?;
        tracing::info!(cluster = %self.config.id, engine = ?req.engine, "Created cluster");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let req = self.config.delete_request();
        match self
            .guard
            .run(Operation::DeleteDbCluster, self.client.delete_db_cluster(&req))
            .await
        {
            Ok(()) => {
                tracing::info!(
                    cluster = %self.config.id,
                    final_snapshot = ?req.final_db_snapshot_identifier,
                    "Deleted cluster"
                );
                Ok(())
            }
            Err(e) if e.is_cluster_not_found() => {
                tracing::debug!(cluster = %self.config.id, "Cluster already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn reboot(&self) -> Result<()> {
        let req = self.config.reboot_request();
        self.guard
            .run(Operation::RebootDbCluster, self.client.reboot_db_cluster(&req))
            .await?;
        tracing::info!(cluster = %self.config.id, "Rebooted cluster");
        Ok(())
    }

    async fn describe(&self) -> Result<Option<DescCluster>> {
        let req = self.config.describe_request();
        match self
            .guard
            .run(Operation::DescribeDbClusters, self.client.describe_db_clusters(&req))
            .await
        {
            Ok(clusters) => Ok(clusters.into_iter().next()),
            Err(e) if e.is_cluster_not_found() => {
                tracing::debug!(cluster = %self.config.id, "Cluster not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn members(&self) -> Result<Vec<DescInstance>> {
        let req = self.config.members_request();
        let members = self
            .guard
            .run(Operation::DescribeDbInstances, self.client.describe_db_instances(&req))
            .await?;
        tracing::debug!(cluster = %self.config.id, count = members.len(), "Listed members");
        Ok(members)
    }

    async fn failover(&self) -> Result<()> {
        let req = self.config.failover_request();
        self.guard
            .run(Operation::FailoverDbCluster, self.client.failover_db_cluster(&req))
            .await?;
        tracing::info!(
            cluster = %self.config.id,
            target = ?req.target_db_instance_identifier,
            "Failed over cluster"
        );
        Ok(())
    }

    async fn failover_global(&self) -> Result<()> {
        let req = self.config.failover_global_request()?;
        self.guard
            .run(
                Operation::FailoverGlobalCluster,
                self.client.failover_global_cluster(&req),
            )
            .await?;
        tracing::info!(
            global_cluster = %req.global_cluster_identifier,
            target = %req.target_db_cluster_identifier,
            "Failed over global cluster"
        );
        Ok(())
    }

    async fn restore_to_pitr(&self) -> Result<()> {
        let req = self.config.restore_pitr_request()?;
        self.guard
            .run(
                Operation::RestoreDbClusterToPointInTime,
                self.client.restore_db_cluster_to_point_in_time(&req),
            )
            .await?;
        tracing::info!(
            cluster = %self.config.id,
            source = %req.source_db_cluster_identifier,
            restore_to_time = ?req.restore_to_time,
            "Restored cluster to point in time"
        );
        Ok(())
    }

    async fn restore_from_snapshot(&self) -> Result<()> {
        let req = self.config.restore_from_snapshot_request()?;
        self.guard
            .run(
                Operation::RestoreDbClusterFromSnapshot,
                self.client.restore_db_cluster_from_snapshot(&req),
            )
            .await?;
        tracing::info!(
            cluster = %self.config.id,
            snapshot = %req.snapshot_identifier,
            "Restored cluster from snapshot"
        );
        Ok(())
    }

    async fn create_snapshot(&self) -> Result<()> {
        let req = self.config.create_snapshot_request()?;
        self.guard
            .run(
                Operation::CreateDbClusterSnapshot,
                self.client.create_db_cluster_snapshot(&req),
            )
            .await?;
        tracing::info!(
            cluster = %self.config.id,
            snapshot = %req.db_cluster_snapshot_identifier,
            "Created cluster snapshot"
        );
        Ok(())
    }

    async fn describe_snapshot(&self) -> Result<Option<DescClusterSnapshot>> {
        let req = self.config.describe_snapshot_request()?;
        match self
            .guard
            .run(
                Operation::DescribeDbClusterSnapshots,
                self.client.describe_db_cluster_snapshots(&req),
            )
            .await
        {
            Ok(snapshots) => Ok(snapshots.into_iter().next()),
            Err(e) if e.is_snapshot_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

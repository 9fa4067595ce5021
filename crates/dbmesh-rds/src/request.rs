//! Request objects for single control-plane verbs.
//!
//! Each request carries exactly the attributes its verb accepts. Requests are
//! produced by the mapping functions on [`ClusterConfig`](crate::ClusterConfig),
//! [`InstanceConfig`](crate::InstanceConfig), and
//! [`AuroraConfig`](crate::AuroraConfig); they are plain data and never issue
//! calls themselves.

use chrono::{DateTime, Utc};
use dbmesh_core::{ClusterId, InstanceId, SnapshotId};
use serde::{Deserialize, Serialize};

/// Filter name selecting instances that belong to a cluster.
pub const CLUSTER_ID_FILTER: &str = "db-cluster-id";

/// A name/values filter for describe calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// The filter name, e.g. `db-cluster-id`.
    pub name: String,
    /// Values matched by the filter.
    pub values: Vec<String>,
}

impl Filter {
    /// Create a filter with the given name and values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Create a filter matching the members of a cluster.
    #[must_use]
    pub fn cluster_members(cluster: &ClusterId) -> Self {
        Self::new(CLUSTER_ID_FILTER, vec![cluster.to_string()])
    }
}

/// How a point-in-time restore materializes the new cluster's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreType {
    /// Restore as a full copy of the source cluster.
    FullCopy,
    /// Restore as a clone sharing storage with the source cluster.
    CopyOnWrite,
}

impl RestoreType {
    /// The wire value understood by the control plane.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullCopy => "full-copy",
            Self::CopyOnWrite => "copy-on-write",
        }
    }
}

// =============================================================================
// Cluster requests
// =============================================================================

/// Create a cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateClusterRequest {
    /// Identifier of the new cluster.
    pub db_cluster_identifier: ClusterId,
    /// Engine name, e.g. `aurora-mysql`.
    pub engine: Option<String>,
    /// Engine version.
    pub engine_version: Option<String>,
    /// Engine mode, e.g. `provisioned` or `serverless`.
    pub engine_mode: Option<String>,
    /// Master user name.
    pub master_username: Option<String>,
    /// Master user password.
    pub master_user_password: Option<String>,
    /// Let the control plane generate and manage the master password.
    pub manage_master_user_password: Option<bool>,
    /// Name of the initial database.
    pub database_name: Option<String>,
    /// VPC security groups attached to the cluster.
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group the cluster is placed in.
    pub db_subnet_group_name: Option<String>,
    /// Availability zones for cluster storage.
    pub availability_zones: Vec<String>,
    /// Allocated storage in GiB.
    pub allocated_storage: Option<i32>,
    /// Storage type.
    pub storage_type: Option<String>,
    /// Provisioned IOPS.
    pub iops: Option<i32>,
    /// Compute class for clusters that own their compute.
    pub db_cluster_instance_class: Option<String>,
    /// Whether the cluster is reachable from outside its VPC.
    pub publicly_accessible: Option<bool>,
}

/// Delete a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteClusterRequest {
    /// Identifier of the cluster to delete.
    pub db_cluster_identifier: ClusterId,
    /// Skip the final snapshot.
    pub skip_final_snapshot: bool,
    /// Name of the final snapshot taken at deletion.
    pub final_db_snapshot_identifier: Option<SnapshotId>,
}

/// Reboot every instance of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebootClusterRequest {
    /// Identifier of the cluster to reboot.
    pub db_cluster_identifier: ClusterId,
}

/// Fail a cluster over to a new writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailoverClusterRequest {
    /// Identifier of the cluster.
    pub db_cluster_identifier: ClusterId,
    /// Instance promoted to writer; the control plane picks one when absent.
    pub target_db_instance_identifier: Option<InstanceId>,
}

/// Fail a global cluster over to one of its secondary clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailoverGlobalClusterRequest {
    /// Identifier of the global cluster.
    pub global_cluster_identifier: String,
    /// Identifier (or ARN) of the secondary cluster to promote.
    pub target_db_cluster_identifier: String,
}

/// Describe clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescribeClustersRequest {
    /// Restrict the result to a single cluster.
    pub db_cluster_identifier: Option<ClusterId>,
    /// Additional filters.
    pub filters: Vec<Filter>,
}

/// Restore a new cluster shell from a cluster snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreClusterFromSnapshotRequest {
    /// Identifier of the restored cluster.
    pub db_cluster_identifier: ClusterId,
    /// Snapshot to restore from.
    pub snapshot_identifier: SnapshotId,
    /// Engine of the restored cluster.
    pub engine: Option<String>,
    /// Engine version of the restored cluster.
    pub engine_version: Option<String>,
    /// VPC security groups attached to the restored cluster.
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group the restored cluster is placed in.
    pub db_subnet_group_name: Option<String>,
    /// Availability zones for the restored storage.
    pub availability_zones: Vec<String>,
    /// Whether the restored cluster is reachable from outside its VPC.
    pub publicly_accessible: Option<bool>,
}

/// Restore a new cluster shell to a point in time of a source cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreClusterPitrRequest {
    /// Identifier of the restored cluster.
    pub db_cluster_identifier: ClusterId,
    /// Cluster whose history is restored.
    pub source_db_cluster_identifier: ClusterId,
    /// Restore target time (UTC).
    pub restore_to_time: Option<DateTime<Utc>>,
    /// Restore to the latest restorable time instead of `restore_to_time`.
    pub use_latest_restorable_time: bool,
    /// Full copy or copy-on-write.
    pub restore_type: Option<RestoreType>,
    /// Backtrack window in seconds.
    pub backtrack_window: Option<i64>,
    /// VPC security groups attached to the restored cluster.
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group the restored cluster is placed in.
    pub db_subnet_group_name: Option<String>,
    /// Compute class for clusters that own their compute.
    pub db_cluster_instance_class: Option<String>,
    /// Provisioned IOPS.
    pub iops: Option<i32>,
    /// Whether the restored cluster is reachable from outside its VPC.
    pub publicly_accessible: Option<bool>,
}

/// Take a manual snapshot of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateClusterSnapshotRequest {
    /// Cluster to snapshot.
    pub db_cluster_identifier: ClusterId,
    /// Identifier of the new snapshot.
    pub db_cluster_snapshot_identifier: SnapshotId,
}

/// Describe cluster snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescribeClusterSnapshotsRequest {
    /// Restrict the result to snapshots of one cluster.
    pub db_cluster_identifier: Option<ClusterId>,
    /// Restrict the result to a single snapshot.
    pub db_cluster_snapshot_identifier: Option<SnapshotId>,
}

// =============================================================================
// Instance requests
// =============================================================================

/// Create an instance, standalone or as a cluster member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateInstanceRequest {
    /// Identifier of the new instance.
    pub db_instance_identifier: InstanceId,
    /// Compute class, e.g. `db.t3.medium`.
    pub db_instance_class: Option<String>,
    /// Engine name.
    pub engine: Option<String>,
    /// Engine version.
    pub engine_version: Option<String>,
    /// Cluster the instance joins.
    pub db_cluster_identifier: Option<ClusterId>,
    /// Master user name.
    pub master_username: Option<String>,
    /// Master user password.
    pub master_user_password: Option<String>,
    /// Let the control plane generate and manage the master password.
    pub manage_master_user_password: Option<bool>,
    /// Allocated storage in GiB.
    pub allocated_storage: Option<i32>,
    /// Provisioned IOPS.
    pub iops: Option<i32>,
    /// Name of the initial database.
    pub db_name: Option<String>,
    /// VPC security groups attached to the instance.
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group the instance is placed in.
    pub db_subnet_group_name: Option<String>,
    /// Deploy a standby in a second availability zone.
    pub multi_az: Option<bool>,
    /// Availability zone of the instance.
    pub availability_zone: Option<String>,
    /// Whether the instance is reachable from outside its VPC.
    pub publicly_accessible: Option<bool>,
    /// License model.
    pub license_model: Option<String>,
}

/// Delete an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteInstanceRequest {
    /// Identifier of the instance to delete.
    pub db_instance_identifier: InstanceId,
    /// Skip the final snapshot.
    pub skip_final_snapshot: bool,
    /// Name of the final snapshot taken at deletion.
    pub final_db_snapshot_identifier: Option<SnapshotId>,
    /// Remove automated backups together with the instance.
    pub delete_automated_backups: Option<bool>,
}

/// Reboot an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebootInstanceRequest {
    /// Identifier of the instance to reboot.
    pub db_instance_identifier: InstanceId,
    /// Reboot through a multi-AZ failover.
    pub force_failover: Option<bool>,
}

/// Describe instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescribeInstancesRequest {
    /// Restrict the result to a single instance.
    pub db_instance_identifier: Option<InstanceId>,
    /// Additional filters.
    pub filters: Vec<Filter>,
}

/// Restore a new standalone instance to a point in time of a source instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreInstancePitrRequest {
    /// Identifier of the restored instance.
    pub target_db_instance_identifier: InstanceId,
    /// Source instance identifier.
    pub source_db_instance_identifier: Option<InstanceId>,
    /// Source instance resource id.
    pub source_dbi_resource_id: Option<String>,
    /// ARN of replicated automated backups to restore from.
    pub source_db_instance_automated_backups_arn: Option<String>,
    /// Restore target time (UTC).
    pub restore_time: Option<DateTime<Utc>>,
    /// Restore to the latest restorable time instead of `restore_time`.
    pub use_latest_restorable_time: bool,
    /// Compute class of the restored instance.
    pub db_instance_class: Option<String>,
    /// Provisioned IOPS.
    pub iops: Option<i32>,
    /// Database name of the restored instance.
    pub db_name: Option<String>,
    /// VPC security groups attached to the restored instance.
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group the restored instance is placed in.
    pub db_subnet_group_name: Option<String>,
    /// Deploy a standby in a second availability zone.
    pub multi_az: Option<bool>,
    /// Availability zone of the restored instance.
    pub availability_zone: Option<String>,
    /// Whether the restored instance is reachable from outside its VPC.
    pub publicly_accessible: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_member_filter() {
        let filter = Filter::cluster_members(&ClusterId::new("db1"));
        assert_eq!(filter.name, CLUSTER_ID_FILTER);
        assert_eq!(filter.values, vec!["db1".to_string()]);
    }

    #[test]
    fn restore_type_wire_values() {
        assert_eq!(RestoreType::FullCopy.as_str(), "full-copy");
        assert_eq!(RestoreType::CopyOnWrite.as_str(), "copy-on-write");
        assert_eq!(
            serde_json::to_string(&RestoreType::CopyOnWrite).unwrap(),
            "\"copy-on-write\""
        );
    }
}

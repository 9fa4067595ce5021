//! Projections of control-plane state and service configuration.
//!
//! Projections are produced fresh by every describe call and are never cached.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dbmesh_core::{ClusterId, InstanceId, SnapshotId};
use serde::{Deserialize, Serialize};

/// Read-only view of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescCluster {
    /// Cluster identifier.
    pub db_cluster_identifier: String,
    /// Cluster ARN.
    pub db_cluster_arn: String,
    /// Current status, e.g. `available` or `creating`.
    pub status: String,
    /// Writer endpoint.
    pub primary_endpoint: String,
    /// Load-balanced reader endpoint.
    pub reader_endpoint: String,
    /// Custom endpoints.
    #[serde(default)]
    pub custom_endpoints: Vec<String>,
    /// Port the endpoints listen on.
    pub port: i32,
    /// Member instances.
    #[serde(default)]
    pub members: Vec<ClusterMember>,
    /// Availability zones holding cluster storage.
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Character set of the cluster.
    pub character_set_name: String,
    /// Cluster parameter group.
    pub db_cluster_parameter_group: String,
    /// Read replica cluster identifiers.
    #[serde(default)]
    pub read_replica_identifiers: Vec<String>,
    /// Source cluster when this cluster is a replica.
    pub replication_source_identifier: String,
    /// Whether deletion protection is enabled.
    pub deletion_protection: bool,
    /// When the cluster was created.
    pub cluster_create_time: Option<DateTime<Utc>>,
}

impl DescCluster {
    /// Returns the member currently acting as writer, if any.
    #[must_use]
    pub fn writer(&self) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.is_cluster_writer)
    }
}

/// A member instance of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Member instance identifier.
    pub db_instance_identifier: String,
    /// Whether the member is the cluster writer.
    pub is_cluster_writer: bool,
    /// Parameter group apply status of the member.
    pub db_cluster_parameter_group_status: String,
}

/// Read-only view of an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescInstance {
    /// Instance identifier.
    pub db_instance_identifier: String,
    /// Instance ARN.
    pub db_instance_arn: String,
    /// Current status, e.g. `available`.
    pub db_instance_status: String,
    /// Cluster the instance belongs to, empty when standalone.
    pub db_cluster_identifier: String,
    /// Connection endpoint.
    pub endpoint: Endpoint,
    /// Parameter groups and their apply status.
    #[serde(default)]
    pub db_parameter_groups: Vec<ParameterGroupStatus>,
    /// Source instance when this instance is a read replica.
    pub read_replica_source_db_instance_identifier: String,
    /// Read replica instance identifiers.
    #[serde(default)]
    pub read_replica_db_instance_identifiers: Vec<String>,
    /// Read replica cluster identifiers.
    #[serde(default)]
    pub read_replica_db_cluster_identifiers: Vec<String>,
    /// Replication status entries.
    #[serde(default)]
    pub read_replica_status_infos: Vec<ReadReplicaStatus>,
    /// Character set of the instance.
    pub character_set_name: String,
    /// Time zone of the instance.
    pub timezone: String,
    /// Standby availability zone for multi-AZ instances.
    pub secondary_availability_zone: String,
    /// Whether deletion protection is enabled.
    pub deletion_protection: bool,
    /// When the instance was created.
    pub instance_create_time: Option<DateTime<Utc>>,
}

/// A network endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// DNS address.
    pub address: String,
    /// Port.
    pub port: i32,
}

/// A parameter group attached to an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterGroupStatus {
    /// Parameter group name.
    pub name: String,
    /// Apply status, e.g. `in-sync`.
    pub apply_status: String,
}

/// Replication status of a read replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReplicaStatus {
    /// Status message when in error.
    pub message: String,
    /// Whether replication is healthy.
    pub normal: bool,
    /// Status value, e.g. `replicating`.
    pub status: String,
    /// Status type, e.g. `read replication`.
    pub status_type: String,
}

/// Read-only view of a cluster snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescClusterSnapshot {
    /// Snapshot identifier.
    pub db_cluster_snapshot_identifier: String,
    /// Cluster the snapshot was taken from.
    pub db_cluster_identifier: String,
    /// Snapshot ARN.
    pub db_cluster_snapshot_arn: String,
    /// Current status, e.g. `available` or `creating`.
    pub status: String,
    /// Engine of the snapshotted cluster.
    pub engine: String,
    /// `manual` or `automated`.
    pub snapshot_type: String,
    /// Allocated storage in GiB.
    pub allocated_storage: i32,
    /// Progress of the snapshot in percent.
    pub percent_progress: i32,
    /// When the snapshot was taken.
    pub snapshot_create_time: Option<DateTime<Utc>>,
}

impl DescCluster {
    /// Returns the cluster identifier as a typed id.
    #[must_use]
    pub fn cluster_id(&self) -> ClusterId {
        ClusterId::new(self.db_cluster_identifier.as_str())
    }
}

impl DescInstance {
    /// Returns the instance identifier as a typed id.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        InstanceId::new(self.db_instance_identifier.as_str())
    }
}

impl DescClusterSnapshot {
    /// Returns the snapshot identifier as a typed id.
    #[must_use]
    pub fn snapshot_id(&self) -> SnapshotId {
        SnapshotId::new(self.db_cluster_snapshot_identifier.as_str())
    }
}

/// Environment variable overriding [`RdsConfig::call_timeout_seconds`].
pub const CALL_TIMEOUT_ENV: &str = "DBMESH_CALL_TIMEOUT_SECONDS";

/// Configuration for the lifecycle service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RdsConfig {
    /// Deadline for each individual control-plane call (seconds, 0 disables).
    #[serde(default = "RdsConfig::default_call_timeout")]
    pub call_timeout_seconds: u64,
}

impl RdsConfig {
    const fn default_call_timeout() -> u64 {
        120
    }

    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Unparsable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(CALL_TIMEOUT_ENV) {
            match raw.trim().parse() {
                Ok(secs) => config.call_timeout_seconds = secs,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid {CALL_TIMEOUT_ENV}"),
            }
        }
        config
    }

    /// Get the per-call deadline, or `None` when disabled.
    #[must_use]
    pub const fn call_timeout(&self) -> Option<Duration> {
        if self.call_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.call_timeout_seconds))
        }
    }
}

impl Default for RdsConfig {
    fn default() -> Self {
        Self {
            call_timeout_seconds: Self::default_call_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RdsConfig::default();
        assert_eq!(config.call_timeout_seconds, 120);
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn zero_disables_deadline() {
        let config = RdsConfig {
            call_timeout_seconds: 0,
        };
        assert_eq!(config.call_timeout(), None);
    }

    #[test]
    fn config_deserialize_uses_defaults() {
        let config: RdsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RdsConfig::default());
    }

    #[test]
    fn writer_lookup() {
        let desc = DescCluster {
            db_cluster_identifier: "db1".to_string(),
            members: vec![
                ClusterMember {
                    db_instance_identifier: "db1-instance-2".to_string(),
                    ..ClusterMember::default()
                },
                ClusterMember {
                    db_instance_identifier: "db1-instance-1".to_string(),
                    is_cluster_writer: true,
                    ..ClusterMember::default()
                },
            ],
            ..DescCluster::default()
        };
        assert_eq!(
            desc.writer().map(|m| m.db_instance_identifier.as_str()),
            Some("db1-instance-1")
        );
        assert_eq!(desc.cluster_id(), ClusterId::new("db1"));
    }
}

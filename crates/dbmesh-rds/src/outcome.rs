//! Typed outcomes of multi-step protocols.
//!
//! Every protocol returns a [`ProtocolResult`]. On success the caller gets the
//! ordered list of steps that ran; on failure it additionally learns which
//! step failed and whether anything had already been changed, so a partial
//! topology is visible without inspecting the error.

use std::fmt;

use dbmesh_core::{ClusterId, InstanceId, SnapshotId};
use serde::Serialize;

use crate::error::RdsError;
use crate::lifecycle::TopologyState;

/// Result of a multi-step protocol.
pub type ProtocolResult = std::result::Result<Applied, Aborted>;

/// The multi-step protocols of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Cluster, then N derived members.
    Create,
    /// Cluster, then one named primary.
    CreateWithPrimary,
    /// Members, then the cluster.
    Delete,
    /// Describe, then create when absent.
    CreateSnapshot,
    /// Cluster restored from a snapshot, then N derived members.
    RestoreFromSnapshot,
    /// Cluster restored to a point in time, then N derived members.
    RestoreToPitr,
}

impl Protocol {
    /// State a topology enters while the protocol runs, if it changes topology.
    #[must_use]
    pub const fn entry_state(&self) -> Option<TopologyState> {
        match self {
            Self::Create | Self::CreateWithPrimary => Some(TopologyState::Creating),
            Self::Delete => Some(TopologyState::Deleting),
            Self::RestoreFromSnapshot | Self::RestoreToPitr => Some(TopologyState::Restoring),
            Self::CreateSnapshot => None,
        }
    }

    /// State a topology settles in when the protocol completes.
    #[must_use]
    pub const fn settled_state(&self) -> Option<TopologyState> {
        match self {
            Self::Create
            | Self::CreateWithPrimary
            | Self::RestoreFromSnapshot
            | Self::RestoreToPitr => Some(TopologyState::Ready),
            Self::Delete => Some(TopologyState::Absent),
            Self::CreateSnapshot => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::CreateWithPrimary => "create-with-primary",
            Self::Delete => "delete",
            Self::CreateSnapshot => "create-snapshot",
            Self::RestoreFromSnapshot => "restore-from-snapshot",
            Self::RestoreToPitr => "restore-to-pitr",
        };
        f.write_str(s)
    }
}

/// One step of a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Local precondition checks.
    CheckPreconditions,
    /// Create the cluster shell.
    CreateCluster {
        /// Cluster created.
        cluster: ClusterId,
    },
    /// Create one member instance.
    CreateInstance {
        /// Instance created.
        instance: InstanceId,
    },
    /// Enumerate the members of a cluster.
    DescribeMembers {
        /// Cluster enumerated.
        cluster: ClusterId,
    },
    /// Delete one member instance.
    DeleteInstance {
        /// Instance deleted.
        instance: InstanceId,
    },
    /// Delete the cluster shell.
    DeleteCluster {
        /// Cluster deleted.
        cluster: ClusterId,
    },
    /// Check whether a snapshot already exists.
    DescribeSnapshot {
        /// Snapshot looked up.
        snapshot: SnapshotId,
    },
    /// Create a snapshot.
    CreateSnapshot {
        /// Snapshot created.
        snapshot: SnapshotId,
    },
    /// Restore a cluster shell from a snapshot.
    RestoreFromSnapshot {
        /// Cluster restored.
        cluster: ClusterId,
        /// Snapshot restored from.
        snapshot: SnapshotId,
    },
    /// Restore a cluster shell to a point in time.
    RestoreToPointInTime {
        /// Cluster restored.
        cluster: ClusterId,
        /// Cluster whose history was restored.
        source: ClusterId,
    },
}

impl Step {
    /// Returns true if completing this step changes control-plane state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::CheckPreconditions | Self::DescribeMembers { .. } | Self::DescribeSnapshot { .. }
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckPreconditions => f.write_str("check preconditions"),
            Self::CreateCluster { cluster } => write!(f, "create cluster {cluster}"),
            Self::CreateInstance { instance } => write!(f, "create instance {instance}"),
            Self::DescribeMembers { cluster } => write!(f, "describe members of {cluster}"),
            Self::DeleteInstance { instance } => write!(f, "delete instance {instance}"),
            Self::DeleteCluster { cluster } => write!(f, "delete cluster {cluster}"),
            Self::DescribeSnapshot { snapshot } => write!(f, "describe snapshot {snapshot}"),
            Self::CreateSnapshot { snapshot } => write!(f, "create snapshot {snapshot}"),
            Self::RestoreFromSnapshot { cluster, snapshot } => {
                write!(f, "restore cluster {cluster} from snapshot {snapshot}")
            }
            Self::RestoreToPointInTime { cluster, source } => {
                write!(f, "restore cluster {cluster} to a point in time of {source}")
            }
        }
    }
}

/// A protocol that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied {
    /// The protocol that ran.
    pub protocol: Protocol,
    /// Completed steps, in order.
    pub steps: Vec<Step>,
    /// Where the topology now stands, `None` when the protocol does not
    /// change topology.
    pub state: Option<TopologyState>,
}

impl Applied {
    /// Returns true if any step changed control-plane state.
    ///
    /// False for an idempotent snapshot request that found the snapshot.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.steps.iter().any(Step::is_mutation)
    }

    /// Instances created by the protocol, in order.
    #[must_use]
    pub fn created_instances(&self) -> Vec<&InstanceId> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::CreateInstance { instance } => Some(instance),
                _ => None,
            })
            .collect()
    }
}

/// A protocol that stopped at its first failed step.
#[derive(Debug, thiserror::Error)]
#[error("{protocol} aborted at {failed}: {error}")]
pub struct Aborted {
    /// The protocol that aborted.
    pub protocol: Protocol,
    /// The step that failed.
    pub failed: Step,
    /// Steps that completed before the failure, in order.
    pub steps: Vec<Step>,
    /// Where the topology was left: `Some(Partial)` when a mutating step had
    /// completed, `None` when nothing was changed.
    pub state: Option<TopologyState>,
    /// The error that stopped the protocol.
    #[source]
    pub error: RdsError,
}

impl Aborted {
    /// Returns true if the protocol left a partially changed topology.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.state == Some(TopologyState::Partial)
    }

    /// Consume the outcome and return the underlying error.
    #[must_use]
    pub fn into_error(self) -> RdsError {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_mutation_flags() {
        assert!(!Step::CheckPreconditions.is_mutation());
        assert!(!Step::DescribeMembers {
            cluster: ClusterId::new("db1")
        }
        .is_mutation());
        assert!(Step::CreateInstance {
            instance: InstanceId::new("db1-instance-1")
        }
        .is_mutation());
        assert!(Step::RestoreToPointInTime {
            cluster: ClusterId::new("db2"),
            source: ClusterId::new("db1"),
        }
        .is_mutation());
    }

    #[test]
    fn aborted_display_names_step() {
        let aborted = Aborted {
            protocol: Protocol::Create,
            failed: Step::CreateInstance {
                instance: InstanceId::new("db1-instance-2"),
            },
            steps: vec![Step::CreateCluster {
                cluster: ClusterId::new("db1"),
            }],
            state: Some(TopologyState::Partial),
            error: RdsError::Transport("connection reset".to_string()),
        };
        assert!(aborted.is_partial());
        assert_eq!(
            aborted.to_string(),
            "create aborted at create instance db1-instance-2: transport error: connection reset"
        );
    }

    #[test]
    fn protocol_states() {
        assert_eq!(Protocol::Delete.entry_state(), Some(TopologyState::Deleting));
        assert_eq!(Protocol::Delete.settled_state(), Some(TopologyState::Absent));
        assert_eq!(Protocol::CreateSnapshot.entry_state(), None);
    }

    #[test]
    fn step_serializes_tagged() {
        let json = serde_json::to_value(Step::DeleteInstance {
            instance: InstanceId::new("db1-instance-3"),
        })
        .unwrap();
        assert_eq!(json["step"], "delete_instance");
        assert_eq!(json["instance"], "db1-instance-3");
    }
}

//! Command-line arguments.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use dbmesh_aws::SessionConfig;
use dbmesh_core::{ClusterId, InstanceId, SnapshotId};

/// dbmesh - lifecycle orchestration for managed database topologies.
#[derive(Parser, Debug)]
#[command(name = "dbmesh")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Region to operate in.
    #[arg(long, env = "AWS_REGION")]
    pub region: String,

    /// Static access key id; the default provider chain is used when unset.
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Static secret access key.
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    /// Deadline for each control-plane call in seconds (0 disables).
    #[arg(long, env = "DBMESH_CALL_TIMEOUT_SECONDS", default_value_t = 120)]
    pub call_timeout: u64,

    /// Lifecycle verb to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// The session this invocation authenticates with.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IncompleteCredentials` when only one half of
    /// the static key pair was given, instead of falling back to the
    /// default provider chain.
    pub fn session(&self) -> dbmesh_aws::Result<SessionConfig> {
        let session = SessionConfig {
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        };
        session.credentials()?;
        Ok(session)
    }
}

/// Lifecycle verbs.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the topology a descriptor asks for (Aurora by default).
    Create(TopologyArgs),

    /// Create an Aurora cluster with one named primary instance.
    CreatePrimary {
        #[command(flatten)]
        topology: TopologyArgs,
        /// Identifier of the primary instance.
        #[arg(long)]
        primary: InstanceId,
    },

    /// Delete every member of a cluster, then the cluster.
    Delete {
        #[command(flatten)]
        topology: TopologyArgs,
        #[command(flatten)]
        retention: RetentionArgs,
    },

    /// Describe a cluster.
    Describe {
        /// Cluster identifier.
        #[arg(long)]
        cluster: ClusterId,
    },

    /// Describe an instance.
    DescribeInstance {
        /// Instance identifier.
        #[arg(long)]
        instance: InstanceId,
    },

    /// Take a cluster snapshot unless it already exists.
    Snapshot {
        /// Cluster identifier.
        #[arg(long)]
        cluster: ClusterId,
        /// Snapshot identifier.
        #[arg(long)]
        snapshot: SnapshotId,
    },

    /// Describe a cluster snapshot.
    DescribeSnapshot {
        /// Cluster identifier.
        #[arg(long)]
        cluster: ClusterId,
        /// Snapshot identifier.
        #[arg(long)]
        snapshot: SnapshotId,
    },

    /// Restore a cluster from a snapshot and re-attach its members.
    RestoreSnapshot {
        #[command(flatten)]
        topology: TopologyArgs,
        /// Snapshot to restore from.
        #[arg(long)]
        snapshot: SnapshotId,
    },

    /// Restore a cluster to a point in time of another and re-attach its members.
    RestorePitr {
        #[command(flatten)]
        topology: TopologyArgs,
        /// Cluster whose history is restored.
        #[arg(long)]
        source: ClusterId,
        /// Restore target (RFC 3339).
        #[arg(long, conflicts_with = "latest")]
        restore_time: Option<DateTime<Utc>>,
        /// Restore to the latest restorable time.
        #[arg(long)]
        latest: bool,
    },

    /// Fail a cluster over to a target instance or a chosen reader.
    Failover {
        /// Cluster identifier.
        #[arg(long)]
        cluster: ClusterId,
        /// Instance to promote.
        #[arg(long)]
        target: Option<InstanceId>,
    },
}

/// Topology selection shared by the multi-step verbs.
#[derive(ClapArgs, Debug, Clone)]
pub struct TopologyArgs {
    /// Cluster identifier.
    #[arg(long)]
    pub cluster: ClusterId,

    /// `DatabaseClass` descriptor (JSON).
    #[arg(long)]
    pub descriptor: Option<PathBuf>,

    /// Number of member instances.
    #[arg(long, default_value_t = 1)]
    pub instances: u32,

    /// Master user password.
    #[arg(long, env = "DBMESH_MASTER_PASSWORD", hide_env_values = true)]
    pub master_password: Option<String>,
}

/// Delete-time retention settings.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RetentionArgs {
    /// Delete without a final snapshot.
    #[arg(long)]
    pub skip_final_snapshot: bool,

    /// Final cluster snapshot identifier.
    #[arg(long)]
    pub final_snapshot: Option<SnapshotId>,

    /// Remove automated backups of the members.
    #[arg(long)]
    pub delete_automated_backups: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use dbmesh_aws::SessionError;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_delete() {
        let args = Args::try_parse_from([
            "dbmesh",
            "--region",
            "us-east-1",
            "delete",
            "--cluster",
            "db1",
            "--instances",
            "3",
            "--skip-final-snapshot",
        ])
        .unwrap();
        assert_eq!(args.call_timeout, 120);
        let Command::Delete { topology, retention } = args.command else {
            panic!("expected delete");
        };
        assert_eq!(topology.cluster, ClusterId::new("db1"));
        assert_eq!(topology.instances, 3);
        assert!(retention.skip_final_snapshot);
        assert!(retention.final_snapshot.is_none());
    }

    fn with_keys(access_key_id: Option<&str>, secret_access_key: Option<&str>) -> Args {
        Args {
            region: "eu-west-1".to_string(),
            access_key_id: access_key_id.map(str::to_string),
            secret_access_key: secret_access_key.map(str::to_string),
            call_timeout: 120,
            command: Command::Describe {
                cluster: ClusterId::new("db1"),
            },
        }
    }

    #[test]
    fn half_a_key_pair_is_refused() {
        assert_eq!(
            with_keys(Some("AKIDEXAMPLE"), None).session().unwrap_err(),
            SessionError::IncompleteCredentials("eu-west-1".to_string())
        );
        assert!(with_keys(None, Some("secret")).session().is_err());
    }

    #[test]
    fn session_follows_flags() {
        let session = with_keys(Some("AKIDEXAMPLE"), Some("secret")).session().unwrap();
        assert_eq!(session.region, "eu-west-1");
        assert_eq!(session.access_key_id.as_deref(), Some("AKIDEXAMPLE"));

        let session = with_keys(None, None).session().unwrap();
        assert!(session.access_key_id.is_none());
        assert!(session.secret_access_key.is_none());
    }

    #[test]
    fn rejects_empty_identifier() {
        let result = Args::try_parse_from([
            "dbmesh", "--region", "us-east-1", "describe", "--cluster", " ",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn restore_time_conflicts_with_latest() {
        let result = Args::try_parse_from([
            "dbmesh",
            "--region",
            "us-east-1",
            "restore-pitr",
            "--cluster",
            "db3",
            "--source",
            "db1",
            "--restore-time",
            "2024-03-01T12:00:00Z",
            "--latest",
        ]);
        assert!(result.is_err());
    }
}

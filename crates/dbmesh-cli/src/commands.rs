//! Lifecycle verb execution.
//!
//! Every verb produces a JSON document: projections for describes, outcome
//! reports for multi-step protocols. An aborted protocol still prints its
//! report before the error is returned, so a partial topology is visible.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use dbmesh_rds::{
    Aborted, Applied, Aurora, AuroraConfig, Cluster, ClusterConfig, ControlPlane, DatabaseClass,
    Instance, InstanceConfig, ProtocolResult, RdsService, Topology,
};
use serde_json::{json, Value};

use crate::cli::{Command, RetentionArgs, TopologyArgs};

/// Load a `DatabaseClass` descriptor from a JSON file.
pub fn load_descriptor(path: &Path) -> Result<DatabaseClass> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing descriptor {}", path.display()))
}

/// Build the topology a verb operates on.
///
/// Without a descriptor the topology is an Aurora cluster with the requested
/// number of members.
fn topology(args: &TopologyArgs) -> Result<Topology> {
    let topology = match &args.descriptor {
        Some(path) => {
            let class = load_descriptor(path)?;
            tracing::debug!(
                descriptor = %class.metadata.name,
                provisioner = %class.spec.provisioner,
                "Loaded descriptor"
            );
            class.topology(args.cluster.as_str(), args.instances)
        }
        None => Topology::Aurora(
            AuroraConfig::new(args.cluster.clone()).instance_number(args.instances),
        ),
    };
    let Some(password) = args.master_password.clone() else {
        return Ok(topology);
    };
    Ok(match topology {
        Topology::Instance(c) => Topology::Instance(c.master_user_password(password)),
        Topology::Cluster(c) => Topology::Cluster(c.master_user_password(password)),
        Topology::Aurora(c) => Topology::Aurora(c.master_user_password(password)),
    })
}

fn aurora(args: &TopologyArgs) -> Result<AuroraConfig> {
    match topology(args)? {
        Topology::Aurora(config) => Ok(config),
        _ => anyhow::bail!("this verb needs an AWSRdsAurora descriptor"),
    }
}

fn with_retention(config: AuroraConfig, retention: &RetentionArgs) -> AuroraConfig {
    let config = config
        .skip_final_snapshot(retention.skip_final_snapshot)
        .delete_automated_backups(retention.delete_automated_backups);
    match retention.final_snapshot.clone() {
        Some(id) => config.final_snapshot_identifier(id),
        None => config,
    }
}

fn applied_report(applied: &Applied) -> Value {
    json!({
        "outcome": "applied",
        "protocol": applied.protocol,
        "steps": applied.steps,
        "state": applied.state,
        "changed": applied.changed(),
    })
}

fn aborted_report(aborted: &Aborted) -> Value {
    json!({
        "outcome": "aborted",
        "protocol": aborted.protocol,
        "failed": aborted.failed,
        "steps": aborted.steps,
        "state": aborted.state,
        "partial": aborted.is_partial(),
        "error": aborted.error.to_string(),
    })
}

/// A protocol outcome as a report, or the report plus the abort.
pub struct Report {
    /// JSON document to print.
    pub output: Value,
    /// The abort, when the protocol did not complete.
    pub aborted: Option<Aborted>,
}

impl Report {
    fn value(output: Value) -> Self {
        Self {
            output,
            aborted: None,
        }
    }

    fn protocol(result: ProtocolResult) -> Self {
        match result {
            Ok(applied) => Self::value(applied_report(&applied)),
            Err(aborted) => Self {
                output: aborted_report(&aborted),
                aborted: Some(aborted),
            },
        }
    }

    fn done(verb: &str, target: &str) -> Self {
        Self::value(json!({ "outcome": "applied", "verb": verb, "target": target }))
    }
}

/// Run one verb against the service.
pub async fn run<C: ControlPlane + 'static>(
    service: &RdsService<C>,
    command: &Command,
) -> Result<Report> {
    match command {
        Command::Create(args) => match topology(args)? {
            Topology::Aurora(config) => Ok(Report::protocol(service.aurora(config).create().await)),
            Topology::Cluster(config) => {
                let id = config.id.to_string();
                service.cluster(config).create().await?;
                Ok(Report::done("create-cluster", &id))
            }
            Topology::Instance(config) => {
                let id = config.id.to_string();
                service.instance(config).create().await?;
                Ok(Report::done("create-instance", &id))
            }
        },
        Command::CreatePrimary { topology, primary } => {
            let config = aurora(topology)?.primary_instance(primary.clone());
            Ok(Report::protocol(service.aurora(config).create_with_primary().await))
        }
        Command::Delete {
            topology,
            retention,
        } => {
            let config = with_retention(aurora(topology)?, retention);
            Ok(Report::protocol(service.aurora(config).delete().await))
        }
        Command::Describe { cluster } => {
            let desc = service
                .cluster(ClusterConfig::new(cluster.clone()))
                .describe()
                .await?;
            Ok(Report::value(serde_json::to_value(desc)?))
        }
        Command::DescribeInstance { instance } => {
            let desc = service
                .instance(InstanceConfig::new(instance.clone()))
                .describe()
                .await?;
            Ok(Report::value(serde_json::to_value(desc)?))
        }
        Command::Snapshot { cluster, snapshot } => {
            let config = AuroraConfig::new(cluster.clone()).snapshot_identifier(snapshot.clone());
            Ok(Report::protocol(service.aurora(config).create_snapshot().await))
        }
        Command::DescribeSnapshot { cluster, snapshot } => {
            let config = AuroraConfig::new(cluster.clone()).snapshot_identifier(snapshot.clone());
            let desc = service.aurora(config).describe_snapshot().await?;
            Ok(Report::value(serde_json::to_value(desc)?))
        }
        Command::RestoreSnapshot { topology, snapshot } => {
            let config = aurora(topology)?.snapshot_identifier(snapshot.clone());
            Ok(Report::protocol(service.aurora(config).restore_from_snapshot().await))
        }
        Command::RestorePitr {
            topology,
            source,
            restore_time,
            latest,
        } => {
            let mut config = aurora(topology)?
                .source_cluster_identifier(source.clone())
                .use_latest_restorable_time(*latest);
            if let Some(at) = restore_time {
                config = config.restore_to_time(*at);
            }
            Ok(Report::protocol(service.aurora(config).restore_to_pitr().await))
        }
        Command::Failover { cluster, target } => {
            let mut config = AuroraConfig::new(cluster.clone());
            if let Some(target) = target {
                config = config.failover_target(target.clone());
            }
            service.aurora(config).failover_primary().await?;
            Ok(Report::done("failover", cluster.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use clap::Parser;
    use dbmesh_rds::mock::MockControlPlane;
    use dbmesh_rds::Operation;

    use super::*;
    use crate::cli::Args;

    fn parse(argv: &[&str]) -> Command {
        let mut full = vec!["dbmesh", "--region", "us-east-1"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap().command
    }

    fn setup() -> (Arc<MockControlPlane>, RdsService<MockControlPlane>) {
        let mock = Arc::new(MockControlPlane::new());
        let service = RdsService::with_defaults(Arc::clone(&mock));
        (mock, service)
    }

    #[tokio::test]
    async fn create_defaults_to_aurora() {
        let (mock, service) = setup();
        let report = run(&service, &parse(&["create", "--cluster", "db1", "--instances", "2"]))
            .await
            .unwrap();

        assert!(report.aborted.is_none());
        assert_eq!(report.output["outcome"], "applied");
        assert_eq!(report.output["state"], "ready");
        assert_eq!(mock.members("db1"), vec!["db1-instance-1", "db1-instance-2"]);
    }

    #[tokio::test]
    async fn create_follows_descriptor_provisioner() {
        let (mock, service) = setup();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"spec": {{"provisioner": "AWSRdsInstance", "engine": {{"name": "mysql"}}}}}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let report = run(
            &service,
            &parse(&["create", "--cluster", "standalone", "--descriptor", path]),
        )
        .await
        .unwrap();

        assert_eq!(report.output["verb"], "create-instance");
        assert_eq!(mock.targets(Operation::CreateDbInstance), vec!["standalone"]);
        assert!(mock.targets(Operation::CreateDbCluster).is_empty());
    }

    #[tokio::test]
    async fn aborted_delete_is_reported() {
        let (mock, service) = setup();
        let report = run(&service, &parse(&["delete", "--cluster", "db1"]))
            .await
            .unwrap();

        let aborted = report.aborted.unwrap();
        assert!(!aborted.is_partial());
        assert_eq!(report.output["outcome"], "aborted");
        assert_eq!(report.output["failed"]["step"], "check_preconditions");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn describe_absent_cluster_prints_null() {
        let (_mock, service) = setup();
        let report = run(&service, &parse(&["describe", "--cluster", "missing"]))
            .await
            .unwrap();
        assert_eq!(report.output, Value::Null);
    }

    #[tokio::test]
    async fn snapshot_verb_is_idempotent() {
        let (mock, service) = setup();
        mock.seed_cluster("db1");
        let command = parse(&["snapshot", "--cluster", "db1", "--snapshot", "snap1"]);

        let first = run(&service, &command).await.unwrap();
        let second = run(&service, &command).await.unwrap();

        assert_eq!(first.output["changed"], true);
        assert_eq!(second.output["changed"], false);
        assert_eq!(mock.targets(Operation::CreateDbClusterSnapshot), vec!["snap1"]);
    }

    #[test]
    fn missing_descriptor_is_an_error() {
        let err = load_descriptor(Path::new("/nonexistent/class.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/class.json"));
    }
}

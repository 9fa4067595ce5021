//! Aurora topology orchestrator.
//!
//! An Aurora topology is one cluster shell plus N member instances named
//! `{cluster}-instance-{ordinal}`. The orchestrator composes the cluster and
//! instance managers into multi-step protocols:
//!
//! ```text
//!   create            CreateCluster ─▶ CreateInstance ×N
//!   create-primary    CreateCluster ─▶ CreateInstance (named primary)
//!   delete            CheckPreconditions ─▶ DescribeMembers ─▶ DeleteInstance ×M ─▶ DeleteCluster
//!   create-snapshot   DescribeSnapshot ─▶ (CreateSnapshot when absent)
//!   restore-snapshot  RestoreFromSnapshot ─▶ CreateInstance ×N
//!   restore-pitr      RestoreToPointInTime ─▶ CreateInstance ×N
//! ```
//!
//! Steps run strictly in order and each protocol stops at its first failure.
//! Nothing is retried or rolled back: an aborted protocol reports the steps
//! that completed and, when any of them changed the topology, marks it
//! [`Partial`](crate::TopologyState::Partial). Restores only rebuild the
//! cluster shell, so both restore protocols re-attach members with the same
//! loop used by `create`.
//!
//! Operations on the same cluster must be serialized by the caller.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbmesh_core::{ClusterId, InstanceId, SnapshotId};
use serde::{Deserialize, Serialize};

use crate::client::{CallGuard, ControlPlane};
use crate::cluster::{required, Cluster, ClusterConfig, ClusterManager};
use crate::error::{RdsError, Result};
use crate::instance::{Instance, InstanceConfig, InstanceManager};
use crate::lifecycle::{self, TopologyState};
use crate::outcome::{Aborted, Applied, Protocol, ProtocolResult, Step};
use crate::request::{Filter, RestoreType};
use crate::types::{DescCluster, DescClusterSnapshot};

/// Configuration of an Aurora topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuroraConfig {
    /// Identifier of the cluster.
    pub cluster: ClusterId,
    /// Number of derived member instances.
    #[serde(default)]
    pub instance_number: u32,
    /// Named primary used by `create_with_primary`.
    #[serde(default)]
    pub primary_instance: Option<InstanceId>,
    /// Engine name.
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
    /// Initial database name.
    #[serde(default)]
    pub database_name: Option<String>,
    /// VPC security groups.
    #[serde(default)]
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group.
    #[serde(default)]
    pub db_subnet_group_name: Option<String>,
    /// Availability zones for cluster storage.
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Compute class of the members.
    #[serde(default)]
    pub db_instance_class: Option<String>,
    /// Public accessibility of the members.
    #[serde(default)]
    pub publicly_accessible: Option<bool>,
    /// Skip final snapshots on delete.
    #[serde(default)]
    pub skip_final_snapshot: bool,
    /// Final cluster snapshot taken on delete.
    #[serde(default)]
    pub final_snapshot_identifier: Option<SnapshotId>,
    /// Remove member automated backups on delete.
    #[serde(default)]
    pub delete_automated_backups: Option<bool>,
    /// Snapshot taken by `create_snapshot` and used by `restore_from_snapshot`.
    #[serde(default)]
    pub snapshot_identifier: Option<SnapshotId>,
    /// Source cluster of `restore_to_pitr`.
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
    /// Instance promoted by `failover_primary`.
    #[serde(default)]
    pub failover_target: Option<InstanceId>,
    /// Extra filters for member enumeration on delete.
    #[serde(default)]
    pub instance_filters: Vec<Filter>,
}

impl AuroraConfig {
    /// Create a configuration for the given cluster with no members.
    #[must_use]
    pub fn new(cluster: impl Into<ClusterId>) -> Self {
        Self {
            cluster: cluster.into(),
            instance_number: 0,
            primary_instance: None,
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
            db_instance_class: None,
            publicly_accessible: None,
            skip_final_snapshot: false,
            final_snapshot_identifier: None,
            delete_automated_backups: None,
            snapshot_identifier: None,
            source_cluster_identifier: None,
            restore_to_time: None,
            use_latest_restorable_time: false,
            restore_type: None,
            failover_target: None,
            instance_filters: Vec::new(),
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Set the number of derived member instances.
    #[must_use]
    pub const fn instance_number(mut self, n: u32) -> Self {
        self.instance_number = n;
        self
    }

    /// Name the primary created by `create_with_primary`.
    #[must_use]
    pub fn primary_instance(mut self, id: impl Into<InstanceId>) -> Self {
        self.primary_instance = Some(id.into());
        self
    }

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

    /// Set the member compute class.
    #[must_use]
    pub fn db_instance_class(mut self, class: impl Into<String>) -> Self {
        self.db_instance_class = Some(class.into());
        self
    }

    /// Set member public accessibility.
    #[must_use]
    pub const fn publicly_accessible(mut self, enable: bool) -> Self {
        self.publicly_accessible = Some(enable);
        self
    }

    /// Skip final snapshots on delete.
    #[must_use]
    pub const fn skip_final_snapshot(mut self, skip: bool) -> Self {
        self.skip_final_snapshot = skip;
        self
    }

    /// Name the final cluster snapshot taken on delete.
    #[must_use]
    pub fn final_snapshot_identifier(mut self, id: impl Into<SnapshotId>) -> Self {
        self.final_snapshot_identifier = Some(id.into());
        self
    }

    /// Remove member automated backups on delete.
    #[must_use]
    pub const fn delete_automated_backups(mut self, enable: bool) -> Self {
        self.delete_automated_backups = Some(enable);
        self
    }

    /// Set the snapshot used by the snapshot protocols.
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

    /// Set the instance promoted by `failover_primary`.
    #[must_use]
    pub fn failover_target(mut self, id: impl Into<InstanceId>) -> Self {
        self.failover_target = Some(id.into());
        self
    }

    /// Add a filter for member enumeration on delete.
    #[must_use]
    pub fn instance_filter(mut self, filter: Filter) -> Self {
        self.instance_filters.push(filter);
        self
    }

    // =========================================================================
    // Mapping
    // =========================================================================

    /// The cluster-level part of the topology.
    #[must_use]
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
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
            skip_final_snapshot: self.skip_final_snapshot,
            final_snapshot_identifier: self.final_snapshot_identifier.clone(),
            snapshot_identifier: self.snapshot_identifier.clone(),
            source_cluster_identifier: self.source_cluster_identifier.clone(),
            restore_to_time: self.restore_to_time,
            use_latest_restorable_time: self.use_latest_restorable_time,
            restore_type: self.restore_type,
            failover_target: self.failover_target.clone(),
            instance_filters: self.instance_filters.clone(),
            ..ClusterConfig::new(self.cluster.clone())
        }
    }

    /// The configuration of one member instance.
    #[must_use]
    pub fn member_config(&self, id: InstanceId) -> InstanceConfig {
        InstanceConfig {
            db_instance_class: self.db_instance_class.clone(),
            engine: self.engine.clone(),
            cluster: Some(self.cluster.clone()),
            publicly_accessible: self.publicly_accessible,
            skip_final_snapshot: self.skip_final_snapshot,
            delete_automated_backups: self.delete_automated_backups,
            ..InstanceConfig::new(id)
        }
    }

    /// Derived member identifiers, `{cluster}-instance-1` through `-N`.
    #[must_use]
    pub fn member_ids(&self) -> Vec<InstanceId> {
        (1..=self.instance_number)
            .map(|ordinal| InstanceId::member(&self.cluster, ordinal))
            .collect()
    }

    /// The configuration of the named primary.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if no primary is named.
    pub fn primary_config(&self) -> Result<InstanceConfig> {
        let id = required(self.primary_instance.clone(), "primary instance identifier")?;
        Ok(self.member_config(id))
    }

    /// Check the delete precondition.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` unless final snapshots are skipped or a
    /// final snapshot is named.
    pub fn check_delete(&self) -> Result<()> {
        if self.skip_final_snapshot || self.final_snapshot_identifier.is_some() {
            Ok(())
        } else {
            Err(RdsError::Validation(
                "final snapshot identifier is required when skip final snapshot is false"
                    .to_string(),
            ))
        }
    }
}

/// Multi-resource operations on an Aurora topology.
#[async_trait]
pub trait Aurora: Send + Sync {
    /// The configuration this orchestrator operates on.
    fn config(&self) -> &AuroraConfig;

    /// Create the cluster, then N derived members.
    async fn create(&self) -> ProtocolResult;

    /// Create the cluster, then the named primary.
    async fn create_with_primary(&self) -> ProtocolResult;

    /// Delete every current member, then the cluster.
    async fn delete(&self) -> ProtocolResult;

    /// Take the configured snapshot unless it already exists.
    async fn create_snapshot(&self) -> ProtocolResult;

    /// Restore the cluster from the configured snapshot, then N derived members.
    async fn restore_from_snapshot(&self) -> ProtocolResult;

    /// Restore the cluster to a point in time of its source, then N derived members.
    async fn restore_to_pitr(&self) -> ProtocolResult;

    /// Describe the cluster, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Surfaces any rejection other than cluster-not-found.
    async fn describe(&self) -> Result<Option<DescCluster>>;

    /// Describe the configured snapshot, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when no snapshot is set, and surfaces
    /// any rejection other than snapshot-not-found.
    async fn describe_snapshot(&self) -> Result<Option<DescClusterSnapshot>>;

    /// Fail the cluster over to the configured target or a chosen reader.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn failover_primary(&self) -> Result<()>;

    /// Not implemented.
    ///
    /// # Errors
    ///
    /// Always returns `RdsError::Unsupported`.
    async fn new_readonly_endpoint(&self) -> Result<()>;

    /// Not implemented.
    ///
    /// # Errors
    ///
    /// Always returns `RdsError::Unsupported`.
    async fn failover_random_readonly(&self) -> Result<()>;
}

/// Tracks the steps of one protocol run and settles its outcome.
struct Run {
    protocol: Protocol,
    cluster: ClusterId,
    steps: Vec<Step>,
}

impl Run {
    fn new(protocol: Protocol, cluster: &ClusterId) -> Self {
        tracing::debug!(%protocol, cluster = %cluster, "Starting protocol");
        Self {
            protocol,
            cluster: cluster.clone(),
            steps: Vec::new(),
        }
    }

    async fn attempt<T, F>(&mut self, step: Step, call: F) -> std::result::Result<T, Aborted>
    where
        F: Future<Output = Result<T>>,
    {
        match call.await {
            Ok(value) => {
                self.steps.push(step);
                Ok(value)
            }
            Err(error) => Err(self.abort(step, error)),
        }
    }

    /// The state reached by leaving the protocol's entry state for `to`.
    ///
    /// Protocols without an entry state never move the topology, and a
    /// transition the state machine rejects is logged and not reported.
    fn transition(&self, to: TopologyState) -> Option<TopologyState> {
        let entry = self.protocol.entry_state()?;
        match lifecycle::validate_transition(entry, to) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(protocol = %self.protocol, error = %e, "Dropping topology state");
                None
            }
        }
    }

    fn abort(&mut self, failed: Step, error: RdsError) -> Aborted {
        let changed = self.steps.iter().any(Step::is_mutation);
        let state = if changed {
            self.transition(TopologyState::Partial)
        } else {
            None
        };
        tracing::warn!(
            protocol = %self.protocol,
            cluster = %self.cluster,
            failed = %failed,
            completed = self.steps.len(),
            partial = state.is_some(),
            error = %error,
            "Protocol aborted"
        );
        Aborted {
            protocol: self.protocol,
            failed,
            steps: std::mem::take(&mut self.steps),
            state,
            error,
        }
    }

    fn applied(self) -> Applied {
        let state = self
            .protocol
            .settled_state()
            .and_then(|settled| self.transition(settled));
        tracing::info!(
            protocol = %self.protocol,
            cluster = %self.cluster,
            steps = self.steps.len(),
            "Protocol completed"
        );
        Applied {
            protocol: self.protocol,
            steps: self.steps,
            state,
        }
    }
}

/// Runs Aurora protocols against a control plane.
pub struct AuroraOrchestrator<C: ControlPlane> {
    client: Arc<C>,
    guard: CallGuard,
    config: AuroraConfig,
}

impl<C: ControlPlane + 'static> AuroraOrchestrator<C> {
    /// Create an orchestrator for one topology.
    #[must_use]
    pub const fn new(client: Arc<C>, guard: CallGuard, config: AuroraConfig) -> Self {
        Self {
            client,
            guard,
            config,
        }
    }

    fn cluster(&self) -> ClusterManager<C> {
        ClusterManager::new(
            Arc::clone(&self.client),
            self.guard.clone(),
            self.config.cluster_config(),
        )
    }

    fn instance(&self, config: InstanceConfig) -> InstanceManager<C> {
        InstanceManager::new(Arc::clone(&self.client), self.guard.clone(), config)
    }

    /// Create the derived members one at a time, stopping at the first failure.
    async fn attach_members(&self, run: &mut Run) -> std::result::Result<(), Aborted> {
        for (ordinal, id) in (1..).zip(self.config.member_ids()) {
            let member = self.instance(self.config.member_config(id.clone()));
            run.attempt(Step::CreateInstance { instance: id.clone() }, member.create())
                .await?;
            tracing::debug!(cluster = %self.config.cluster, instance = %id, ordinal, "Attached member");
        }
        Ok(())
    }

    fn precondition<T>(run: &mut Run, check: Result<T>) -> std::result::Result<T, Aborted> {
        check.map_err(|e| run.abort(Step::CheckPreconditions, e))
    }
}

#[async_trait]
impl<C: ControlPlane + 'static> Aurora for AuroraOrchestrator<C> {
    fn config(&self) -> &AuroraConfig {
        &self.config
    }

    async fn create(&self) -> ProtocolResult {
        let mut run = Run::new(Protocol::Create, &self.config.cluster);
        let cluster = self.cluster();
        run.attempt(
            Step::CreateCluster {
                cluster: self.config.cluster.clone(),
            },
            cluster.create(),
        )
        .await?;
        self.attach_members(&mut run).await?;
        Ok(run.applied())
    }

    async fn create_with_primary(&self) -> ProtocolResult {
        let mut run = Run::new(Protocol::CreateWithPrimary, &self.config.cluster);
        let primary = Self::precondition(&mut run, self.config.primary_config())?;

        let cluster = self.cluster();
        run.attempt(
            Step::CreateCluster {
                cluster: self.config.cluster.clone(),
            },
            cluster.create(),
        )
        .await?;

        let instance = primary.id.clone();
        let primary = self.instance(primary);
        run.attempt(Step::CreateInstance { instance }, primary.create())
            .await?;
        Ok(run.applied())
    }

    async fn delete(&self) -> ProtocolResult {
        let mut run = Run::new(Protocol::Delete, &self.config.cluster);
        Self::precondition(&mut run, self.config.check_delete())?;

        let cluster = self.cluster();
        let members = run
            .attempt(
                Step::DescribeMembers {
                    cluster: self.config.cluster.clone(),
                },
                cluster.members(),
            )
            .await?;

        for desc in members {
            let id = desc.instance_id();
            let member = self.instance(self.config.member_config(id.clone()));
            run.attempt(Step::DeleteInstance { instance: id }, member.delete())
                .await?;
        }

        run.attempt(
            Step::DeleteCluster {
                cluster: self.config.cluster.clone(),
            },
            cluster.delete(),
        )
        .await?;
        Ok(run.applied())
    }

    async fn create_snapshot(&self) -> ProtocolResult {
        let mut run = Run::new(Protocol::CreateSnapshot, &self.config.cluster);
        let snapshot = Self::precondition(
            &mut run,
            required(self.config.snapshot_identifier.clone(), "snapshot identifier"),
        )?;

        let cluster = self.cluster();
        let existing = run
            .attempt(
                Step::DescribeSnapshot {
                    snapshot: snapshot.clone(),
                },
                cluster.describe_snapshot(),
            )
            .await?;
        if let Some(existing) = existing {
            tracing::debug!(
                cluster = %self.config.cluster,
                snapshot = %snapshot,
                status = %existing.status,
                "Snapshot already exists"
            );
            return Ok(run.applied());
        }

        run.attempt(Step::CreateSnapshot { snapshot }, cluster.create_snapshot())
            .await?;
        Ok(run.applied())
    }

    async fn restore_from_snapshot(&self) -> ProtocolResult {
        let mut run = Run::new(Protocol::RestoreFromSnapshot, &self.config.cluster);
        let snapshot = Self::precondition(
            &mut run,
            required(self.config.snapshot_identifier.clone(), "snapshot identifier"),
        )?;

        let cluster = self.cluster();
        run.attempt(
            Step::RestoreFromSnapshot {
                cluster: self.config.cluster.clone(),
                snapshot,
            },
            cluster.restore_from_snapshot(),
        )
        .await?;
        self.attach_members(&mut run).await?;
        Ok(run.applied())
    }

    async fn restore_to_pitr(&self) -> ProtocolResult {
        let mut run = Run::new(Protocol::RestoreToPitr, &self.config.cluster);
        let source = Self::precondition(
            &mut run,
            required(
                self.config.source_cluster_identifier.clone(),
                "source cluster identifier",
            ),
        )?;

        let cluster = self.cluster();
        run.attempt(
            Step::RestoreToPointInTime {
                cluster: self.config.cluster.clone(),
                source,
            },
            cluster.restore_to_pitr(),
        )
        .await?;
        self.attach_members(&mut run).await?;
        Ok(run.applied())
    }

    async fn describe(&self) -> Result<Option<DescCluster>> {
        self.cluster().describe().await
    }

    async fn describe_snapshot(&self) -> Result<Option<DescClusterSnapshot>> {
        self.cluster().describe_snapshot().await
    }

    async fn failover_primary(&self) -> Result<()> {
        self.cluster().failover().await
    }

    async fn new_readonly_endpoint(&self) -> Result<()> {
        Err(RdsError::Unsupported("new_readonly_endpoint"))
    }

    async fn failover_random_readonly(&self) -> Result<()> {
        Err(RdsError::Unsupported("failover_random_readonly"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Operation;
    use crate::mock::MockControlPlane;

    fn orchestrator(
        mock: &Arc<MockControlPlane>,
        config: AuroraConfig,
    ) -> AuroraOrchestrator<MockControlPlane> {
        AuroraOrchestrator::new(Arc::clone(mock), CallGuard::default(), config)
    }

    #[test]
    fn member_ids_are_derived_from_cluster() {
        let config = AuroraConfig::new("orders").instance_number(3);
        let ids: Vec<String> = config.member_ids().into_iter().map(String::from).collect();
        assert_eq!(
            ids,
            vec!["orders-instance-1", "orders-instance-2", "orders-instance-3"]
        );
        assert!(AuroraConfig::new("orders").member_ids().is_empty());
    }

    #[test]
    fn member_ids_ignore_setter_order() {
        let a = AuroraConfig::new("db1")
            .engine("aurora-mysql")
            .instance_number(2)
            .db_instance_class("db.r6g.large");
        let b = AuroraConfig::new("db1")
            .instance_number(2)
            .db_instance_class("db.r6g.large")
            .engine("aurora-mysql");
        assert_eq!(a.member_ids(), b.member_ids());
        assert_eq!(a, b);
    }

    #[test]
    fn public_access_only_reaches_members() {
        let config = AuroraConfig::new("db1")
            .publicly_accessible(true)
            .engine("aurora-mysql")
            .db_instance_class("db.r6g.large");

        assert_eq!(config.cluster_config().publicly_accessible, None);
        let member = config.member_config(InstanceId::member(&config.cluster, 1));
        assert_eq!(member.publicly_accessible, Some(true));
        assert_eq!(member.cluster, Some(ClusterId::new("db1")));
        assert_eq!(member.engine.as_deref(), Some("aurora-mysql"));
        assert_eq!(member.db_instance_class.as_deref(), Some("db.r6g.large"));
    }

    #[test]
    fn final_snapshot_goes_to_cluster_only() {
        let config = AuroraConfig::new("db1")
            .final_snapshot_identifier("db1-final")
            .delete_automated_backups(true);
        assert_eq!(
            config.cluster_config().delete_request().final_db_snapshot_identifier,
            Some(SnapshotId::new("db1-final"))
        );
        let member = config.member_config(InstanceId::new("db1-instance-1")).delete_request();
        assert!(member.final_db_snapshot_identifier.is_none());
        assert_eq!(member.delete_automated_backups, Some(true));
    }

    #[test]
    fn delete_precondition() {
        assert!(AuroraConfig::new("db1").check_delete().is_err());
        assert!(AuroraConfig::new("db1").skip_final_snapshot(true).check_delete().is_ok());
        assert!(AuroraConfig::new("db1")
            .final_snapshot_identifier("final")
            .check_delete()
            .is_ok());
    }

    #[test]
    fn run_reports_validated_states() {
        let cluster = ClusterId::new("db1");

        let mut run = Run::new(Protocol::Delete, &cluster);
        run.steps.push(Step::DeleteInstance {
            instance: InstanceId::new("db1-instance-1"),
        });
        let aborted = run.abort(
            Step::DeleteCluster {
                cluster: cluster.clone(),
            },
            RdsError::Cancelled {
                operation: "DeleteDBCluster",
            },
        );
        assert_eq!(aborted.state, Some(TopologyState::Partial));

        let mut run = Run::new(Protocol::Delete, &cluster);
        run.steps.push(Step::CheckPreconditions);
        let aborted = run.abort(
            Step::DescribeMembers {
                cluster: cluster.clone(),
            },
            RdsError::Validation("no members".into()),
        );
        assert_eq!(aborted.state, None);

        let applied = Run::new(Protocol::RestoreToPitr, &cluster).applied();
        assert_eq!(applied.state, Some(TopologyState::Ready));
        let applied = Run::new(Protocol::CreateSnapshot, &cluster).applied();
        assert_eq!(applied.state, None);
    }

    #[tokio::test]
    async fn create_with_primary_requires_a_name() {
        let mock = Arc::new(MockControlPlane::new());
        let aborted = orchestrator(&mock, AuroraConfig::new("db1"))
            .create_with_primary()
            .await
            .unwrap_err();
        assert_eq!(aborted.failed, Step::CheckPreconditions);
        assert!(aborted.state.is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn create_with_primary_uses_given_name() {
        let mock = Arc::new(MockControlPlane::new());
        let applied = orchestrator(
            &mock,
            AuroraConfig::new("db1")
                .instance_number(5)
                .primary_instance("db1-writer"),
        )
        .create_with_primary()
        .await
        .unwrap();

        assert_eq!(applied.state, Some(TopologyState::Ready));
        assert_eq!(mock.targets(Operation::CreateDbInstance), vec!["db1-writer".to_string()]);
    }

    #[tokio::test]
    async fn stubs_are_unsupported() {
        let mock = Arc::new(MockControlPlane::new());
        let aurora = orchestrator(&mock, AuroraConfig::new("db1"));
        assert!(matches!(
            aurora.new_readonly_endpoint().await,
            Err(RdsError::Unsupported(_))
        ));
        assert!(matches!(
            aurora.failover_random_readonly().await,
            Err(RdsError::Unsupported(_))
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn restore_requires_snapshot() {
        let mock = Arc::new(MockControlPlane::new());
        let aborted = orchestrator(&mock, AuroraConfig::new("db2").instance_number(1))
            .restore_from_snapshot()
            .await
            .unwrap_err();
        assert!(matches!(aborted.error, RdsError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_cluster_create_is_not_partial() {
        let mock = Arc::new(MockControlPlane::new());
        mock.seed_cluster("db1");
        let aborted = orchestrator(&mock, AuroraConfig::new("db1").instance_number(2))
            .create()
            .await
            .unwrap_err();
        assert!(!aborted.is_partial());
        assert!(aborted.steps.is_empty());
        assert_eq!(mock.targets(Operation::CreateDbInstance), Vec::<String>::new());
    }
}

//! Instance lifecycle manager.
//!
//! The instance side mirrors [`cluster`](crate::cluster): an immutable
//! [`InstanceConfig`] with one mapping function per verb, and an
//! [`InstanceManager`] that issues the single resulting call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbmesh_core::{ClusterId, InstanceId, SnapshotId};
use serde::{Deserialize, Serialize};

use crate::client::{CallGuard, ControlPlane, Operation};
use crate::error::{RdsError, Result};
use crate::request::{
    CreateInstanceRequest, DeleteInstanceRequest, DescribeInstancesRequest, RebootInstanceRequest,
    RestoreInstancePitrRequest,
};
use crate::types::DescInstance;

/// Configuration of a single instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Identifier of the instance.
    pub id: InstanceId,
    /// Compute class.
    #[serde(default)]
    pub db_instance_class: Option<String>,
    /// Engine name.
    #[serde(default)]
    pub engine: Option<String>,
    /// Engine version.
    #[serde(default)]
    pub engine_version: Option<String>,
    /// Cluster the instance joins.
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    /// Master user name.
    #[serde(default)]
    pub master_username: Option<String>,
    /// Master user password.
    #[serde(default, skip_serializing)]
    pub master_user_password: Option<String>,
    /// Let the control plane manage the master password.
    #[serde(default)]
    pub manage_master_user_password: Option<bool>,
    /// Allocated storage in GiB.
    #[serde(default)]
    pub allocated_storage: Option<i32>,
    /// Provisioned IOPS.
    #[serde(default)]
    pub iops: Option<i32>,
    /// Initial database name.
    #[serde(default)]
    pub db_name: Option<String>,
    /// VPC security groups.
    #[serde(default)]
    pub vpc_security_group_ids: Vec<String>,
    /// Subnet group.
    #[serde(default)]
    pub db_subnet_group_name: Option<String>,
    /// Multi-AZ deployment.
    #[serde(default)]
    pub multi_az: Option<bool>,
    /// Availability zone.
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Public accessibility.
    #[serde(default)]
    pub publicly_accessible: Option<bool>,
    /// License model.
    #[serde(default)]
    pub license_model: Option<String>,
    /// Skip the final snapshot on delete.
    #[serde(default)]
    pub skip_final_snapshot: bool,
    /// Final snapshot taken on delete.
    #[serde(default)]
    pub final_snapshot_identifier: Option<SnapshotId>,
    /// Remove automated backups on delete.
    #[serde(default)]
    pub delete_automated_backups: Option<bool>,
    /// Reboot through a multi-AZ failover.
    #[serde(default)]
    pub force_failover: Option<bool>,
    /// Source instance of a point-in-time restore.
    #[serde(default)]
    pub source_instance: Option<InstanceId>,
    /// Source instance resource id of a point-in-time restore.
    #[serde(default)]
    pub source_dbi_resource_id: Option<String>,
    /// Replicated automated backups of a point-in-time restore.
    #[serde(default)]
    pub source_automated_backups_arn: Option<String>,
    /// Point-in-time restore target.
    #[serde(default)]
    pub restore_time: Option<DateTime<Utc>>,
    /// Restore to the latest restorable time.
    #[serde(default)]
    pub use_latest_restorable_time: bool,
}

impl InstanceConfig {
    /// Create a configuration for the given instance with nothing else set.
    #[must_use]
    pub fn new(id: impl Into<InstanceId>) -> Self {
        Self {
            id: id.into(),
            db_instance_class: None,
            engine: None,
            engine_version: None,
            cluster: None,
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
            skip_final_snapshot: false,
            final_snapshot_identifier: None,
            delete_automated_backups: None,
            force_failover: None,
            source_instance: None,
            source_dbi_resource_id: None,
            source_automated_backups_arn: None,
            restore_time: None,
            use_latest_restorable_time: false,
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Set the compute class.
    #[must_use]
    pub fn db_instance_class(mut self, class: impl Into<String>) -> Self {
        self.db_instance_class = Some(class.into());
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

    /// Attach the instance to a cluster.
    #[must_use]
    pub fn cluster(mut self, cluster: impl Into<ClusterId>) -> Self {
        self.cluster = Some(cluster.into());
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

    /// Set the allocated storage in GiB.
    #[must_use]
    pub const fn allocated_storage(mut self, gib: i32) -> Self {
        self.allocated_storage = Some(gib);
        self
    }

    /// Set the provisioned IOPS.
    #[must_use]
    pub const fn iops(mut self, iops: i32) -> Self {
        self.iops = Some(iops);
        self
    }

    /// Set the initial database name.
    #[must_use]
    pub fn db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = Some(name.into());
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

    /// Enable or disable a multi-AZ deployment.
    #[must_use]
    pub const fn multi_az(mut self, enable: bool) -> Self {
        self.multi_az = Some(enable);
        self
    }

    /// Set the availability zone.
    #[must_use]
    pub fn availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    /// Set public accessibility.
    #[must_use]
    pub const fn publicly_accessible(mut self, enable: bool) -> Self {
        self.publicly_accessible = Some(enable);
        self
    }

    /// Set the license model.
    #[must_use]
    pub fn license_model(mut self, model: impl Into<String>) -> Self {
        self.license_model = Some(model.into());
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

    /// Remove automated backups on delete.
    #[must_use]
    pub const fn delete_automated_backups(mut self, enable: bool) -> Self {
        self.delete_automated_backups = Some(enable);
        self
    }

    /// Reboot through a multi-AZ failover.
    ///
    /// Only meaningful for multi-AZ instances; the control plane rejects it
    /// otherwise.
    #[must_use]
    pub const fn force_failover(mut self, enable: bool) -> Self {
        self.force_failover = Some(enable);
        self
    }

    /// Restore from the given source instance.
    #[must_use]
    pub fn source_instance(mut self, id: impl Into<InstanceId>) -> Self {
        self.source_instance = Some(id.into());
        self
    }

    /// Restore from the given source resource id.
    #[must_use]
    pub fn source_dbi_resource_id(mut self, id: impl Into<String>) -> Self {
        self.source_dbi_resource_id = Some(id.into());
        self
    }

    /// Restore from replicated automated backups.
    #[must_use]
    pub fn source_automated_backups_arn(mut self, arn: impl Into<String>) -> Self {
        self.source_automated_backups_arn = Some(arn.into());
        self
    }

    /// Set the point-in-time restore target.
    #[must_use]
    pub const fn restore_time(mut self, at: DateTime<Utc>) -> Self {
        self.restore_time = Some(at);
        self
    }

    /// Restore to the latest restorable time.
    #[must_use]
    pub const fn use_latest_restorable_time(mut self, enable: bool) -> Self {
        self.use_latest_restorable_time = enable;
        self
    }

    // =========================================================================
    // Mapping
    // =========================================================================

    /// Map to a create request.
    #[must_use]
    pub fn create_request(&self) -> CreateInstanceRequest {
        CreateInstanceRequest {
            db_instance_identifier: self.id.clone(),
            db_instance_class: self.db_instance_class.clone(),
            engine: self.engine.clone(),
            engine_version: self.engine_version.clone(),
            db_cluster_identifier: self.cluster.clone(),
            master_username: self.master_username.clone(),
            master_user_password: self.master_user_password.clone(),
            manage_master_user_password: self.manage_master_user_password,
            allocated_storage: self.allocated_storage,
            iops: self.iops,
            db_name: self.db_name.clone(),
            vpc_security_group_ids: self.vpc_security_group_ids.clone(),
            db_subnet_group_name: self.db_subnet_group_name.clone(),
            multi_az: self.multi_az,
            availability_zone: self.availability_zone.clone(),
            publicly_accessible: self.publicly_accessible,
            license_model: self.license_model.clone(),
        }
    }

    /// Map to a delete request.
    #[must_use]
    pub fn delete_request(&self) -> DeleteInstanceRequest {
        DeleteInstanceRequest {
            db_instance_identifier: self.id.clone(),
            skip_final_snapshot: self.skip_final_snapshot,
            final_db_snapshot_identifier: self.final_snapshot_identifier.clone(),
            delete_automated_backups: self.delete_automated_backups,
        }
    }

    /// Map to a reboot request.
    #[must_use]
    pub fn reboot_request(&self) -> RebootInstanceRequest {
        RebootInstanceRequest {
            db_instance_identifier: self.id.clone(),
            force_failover: self.force_failover,
        }
    }

    /// Map to a describe request for this instance.
    #[must_use]
    pub fn describe_request(&self) -> DescribeInstancesRequest {
        DescribeInstancesRequest {
            db_instance_identifier: Some(self.id.clone()),
            filters: Vec::new(),
        }
    }

    /// Map to a point-in-time restore request that creates this instance.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` if no restore source is set.
    pub fn restore_pitr_request(&self) -> Result<RestoreInstancePitrRequest> {
        if self.source_instance.is_none()
            && self.source_dbi_resource_id.is_none()
            && self.source_automated_backups_arn.is_none()
        {
            return Err(RdsError::Validation(
                "a source instance, resource id, or automated backups ARN is required".to_string(),
            ));
        }
        Ok(RestoreInstancePitrRequest {
            target_db_instance_identifier: self.id.clone(),
            source_db_instance_identifier: self.source_instance.clone(),
            source_dbi_resource_id: self.source_dbi_resource_id.clone(),
            source_db_instance_automated_backups_arn: self.source_automated_backups_arn.clone(),
            restore_time: self.restore_time,
            use_latest_restorable_time: self.use_latest_restorable_time,
            db_instance_class: self.db_instance_class.clone(),
            iops: self.iops,
            db_name: self.db_name.clone(),
            vpc_security_group_ids: self.vpc_security_group_ids.clone(),
            db_subnet_group_name: self.db_subnet_group_name.clone(),
            multi_az: self.multi_az,
            availability_zone: self.availability_zone.clone(),
            publicly_accessible: self.publicly_accessible,
        })
    }
}

/// Single-resource operations on an instance.
#[async_trait]
pub trait Instance: Send + Sync {
    /// The configuration this manager operates on.
    fn config(&self) -> &InstanceConfig;

    /// Create the instance.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn create(&self) -> Result<()>;

    /// Delete the instance. An absent instance counts as deleted.
    ///
    /// # Errors
    ///
    /// Surfaces any rejection other than instance-not-found.
    async fn delete(&self) -> Result<()>;

    /// Reboot the instance.
    ///
    /// # Errors
    ///
    /// Surfaces any control-plane rejection.
    async fn reboot(&self) -> Result<()>;

    /// Describe the instance, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Surfaces any rejection other than instance-not-found.
    async fn describe(&self) -> Result<Option<DescInstance>>;

    /// Create this instance as a point-in-time restore of its source.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Validation` when no source is set, and surfaces any
    /// control-plane rejection.
    async fn restore_to_pitr(&self) -> Result<()>;
}

/// Issues instance verbs against a control plane.
pub struct InstanceManager<C: ControlPlane> {
    client: Arc<C>,
    guard: CallGuard,
    config: InstanceConfig,
}

impl<C: ControlPlane> InstanceManager<C> {
    /// Create a manager for one instance configuration.
    #[must_use]
    pub const fn new(client: Arc<C>, guard: CallGuard, config: InstanceConfig) -> Self {
        Self {
            client,
            guard,
            config,
        }
    }

    /// The instance this manager addresses.
    #[must_use]
    pub const fn id(&self) -> &InstanceId {
        &self.config.id
    }
}

#[async_trait]
impl<C: ControlPlane + 'static> Instance for InstanceManager<C> {
    fn config(&self) -> &InstanceConfig {
        &self.config
    }

    async fn create(&self) -> Result<()> {
        let req = self.config.create_request();
        self.guard
            .run(Operation::CreateDbInstance, self.client.create_db_instance(&req))
            .await?;
        tracing::info!(
            instance = %self.config.id,
            cluster = ?self.config.cluster,
            class = ?req.db_instance_class,
            "Created instance"
        );
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        let req = self.config.delete_request();
        match self
            .guard
            .run(Operation::DeleteDbInstance, self.client.delete_db_instance(&req))
            .await
        {
            Ok(()) => {
                tracing::info!(instance = %self.config.id, "Deleted instance");
                Ok(())
            }
            Err(e) if e.is_instance_not_found() => {
                tracing::debug!(instance = %self.config.id, "Instance already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn reboot(&self) -> Result<()> {
        let req = self.config.reboot_request();
        self.guard
            .run(Operation::RebootDbInstance, self.client.reboot_db_instance(&req))
            .await?;
        tracing::info!(
            instance = %self.config.id,
            force_failover = ?req.force_failover,
            "Rebooted instance"
        );
        Ok(())
    }

    async fn describe(&self) -> Result<Option<DescInstance>> {
        let req = self.config.describe_request();
        match self
            .guard
            .run(Operation::DescribeDbInstances, self.client.describe_db_instances(&req))
            .await
        {
            Ok(instances) => Ok(instances.into_iter().next()),
            Err(e) if e.is_instance_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn restore_to_pitr(&self) -> Result<()> {
        let req = self.config.restore_pitr_request()?;
        self.guard
            .run(
                Operation::RestoreDbInstanceToPointInTime,
                self.client.restore_db_instance_to_point_in_time(&req),
            )
            .await?;
        tracing::info!(
            instance = %self.config.id,
            source = ?req.source_db_instance_identifier,
            restore_time = ?req.restore_time,
            "Restored instance to point in time"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockControlPlane;

    fn manager(mock: &Arc<MockControlPlane>, config: InstanceConfig) -> InstanceManager<MockControlPlane> {
        InstanceManager::new(Arc::clone(mock), CallGuard::default(), config)
    }

    #[test]
    fn delete_settings_map_to_delete_request() {
        let config = InstanceConfig::new("db1-instance-1")
            .skip_final_snapshot(true)
            .delete_automated_backups(true);
        let req = config.delete_request();
        assert!(req.skip_final_snapshot);
        assert_eq!(req.delete_automated_backups, Some(true));
        assert!(req.final_db_snapshot_identifier.is_none());
    }

    #[test]
    fn restore_requires_a_source() {
        let config = InstanceConfig::new("restored");
        assert!(matches!(
            config.restore_pitr_request(),
            Err(RdsError::Validation(_))
        ));

        let req = config
            .source_dbi_resource_id("db-ABCDEFGHIJKL")
            .use_latest_restorable_time(true)
            .restore_pitr_request()
            .unwrap();
        assert_eq!(req.source_dbi_resource_id.as_deref(), Some("db-ABCDEFGHIJKL"));
        assert!(req.use_latest_restorable_time);
    }

    #[tokio::test]
    async fn standalone_lifecycle() {
        let mock = Arc::new(MockControlPlane::new());
        let instance = manager(
            &mock,
            InstanceConfig::new("orders")
                .engine("mysql")
                .db_instance_class("db.t3.micro")
                .allocated_storage(20)
                .skip_final_snapshot(true),
        );

        instance.create().await.unwrap();
        let desc = instance.describe().await.unwrap().unwrap();
        assert_eq!(desc.instance_id(), InstanceId::new("orders"));
        assert!(desc.db_cluster_identifier.is_empty());

        instance.reboot().await.unwrap();
        instance.delete().await.unwrap();
        assert!(instance.describe().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_absent_instance_succeeds() {
        let mock = Arc::new(MockControlPlane::new());
        manager(&mock, InstanceConfig::new("ghost")).delete().await.unwrap();
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn reboot_absent_instance_fails() {
        let mock = Arc::new(MockControlPlane::new());
        let err = manager(&mock, InstanceConfig::new("ghost")).reboot().await.unwrap_err();
        assert!(err.is_instance_not_found());
    }

    #[tokio::test]
    async fn restore_from_source_instance() {
        let mock = Arc::new(MockControlPlane::new());
        mock.seed_instance("orders", None);
        manager(
            &mock,
            InstanceConfig::new("orders-restored").source_instance("orders"),
        )
        .restore_to_pitr()
        .await
        .unwrap();
        assert!(mock.instance_ids().contains(&"orders-restored".to_string()));
    }
}

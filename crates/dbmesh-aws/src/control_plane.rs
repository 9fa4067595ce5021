//! Control plane backed by `aws-sdk-rds`.
//!
//! Each boundary verb maps to exactly one SDK operation. Optional request
//! fields map onto the SDK's `set_*` builders, so an unset attribute is left
//! out of the wire request rather than sent as a zero value. Describes follow
//! the `Marker` until the service stops returning one.

use async_trait::async_trait;
use aws_sdk_rds::Client;
use dbmesh_rds::request::{
    CreateClusterRequest, CreateClusterSnapshotRequest, CreateInstanceRequest,
    DeleteClusterRequest, DeleteInstanceRequest, DescribeClusterSnapshotsRequest,
    DescribeClustersRequest, DescribeInstancesRequest, FailoverClusterRequest,
    FailoverGlobalClusterRequest, RebootClusterRequest, RebootInstanceRequest,
    RestoreClusterFromSnapshotRequest, RestoreClusterPitrRequest, RestoreInstancePitrRequest,
};
use dbmesh_rds::{ControlPlane, DescCluster, DescClusterSnapshot, DescInstance, Result};

use crate::convert::{self, list};
use crate::error::from_sdk;

fn next_marker(marker: Option<String>) -> Option<String> {
    marker.filter(|m| !m.is_empty())
}

/// RDS control plane for one region.
#[derive(Debug, Clone)]
pub struct RdsControlPlane {
    client: Client,
}

impl RdsControlPlane {
    /// Create a control plane from a loaded SDK configuration.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Wrap an existing SDK client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying SDK client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ControlPlane for RdsControlPlane {
    // =========================================================================
    // Clusters
    // =========================================================================

    async fn create_db_cluster(&self, req: &CreateClusterRequest) -> Result<()> {
        self.client
            .create_db_cluster()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .set_engine(req.engine.clone())
            .set_engine_version(req.engine_version.clone())
            .set_engine_mode(req.engine_mode.clone())
            .set_master_username(req.master_username.clone())
            .set_master_user_password(req.master_user_password.clone())
            .set_manage_master_user_password(req.manage_master_user_password)
            .set_database_name(req.database_name.clone())
            .set_vpc_security_group_ids(list(&req.vpc_security_group_ids))
            .set_db_subnet_group_name(req.db_subnet_group_name.clone())
            .set_availability_zones(list(&req.availability_zones))
            .set_allocated_storage(req.allocated_storage)
            .set_storage_type(req.storage_type.clone())
            .set_iops(req.iops)
            .set_db_cluster_instance_class(req.db_cluster_instance_class.clone())
            .set_publicly_accessible(req.publicly_accessible)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_db_cluster(&self, req: &DeleteClusterRequest) -> Result<()> {
        self.client
            .delete_db_cluster()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .skip_final_snapshot(req.skip_final_snapshot)
            .set_final_db_snapshot_identifier(
                req.final_db_snapshot_identifier.as_ref().map(ToString::to_string),
            )
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn reboot_db_cluster(&self, req: &RebootClusterRequest) -> Result<()> {
        self.client
            .reboot_db_cluster()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn failover_db_cluster(&self, req: &FailoverClusterRequest) -> Result<()> {
        self.client
            .failover_db_cluster()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .set_target_db_instance_identifier(
                req.target_db_instance_identifier.as_ref().map(ToString::to_string),
            )
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn failover_global_cluster(&self, req: &FailoverGlobalClusterRequest) -> Result<()> {
        self.client
            .failover_global_cluster()
            .global_cluster_identifier(&req.global_cluster_identifier)
            .target_db_cluster_identifier(&req.target_db_cluster_identifier)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn describe_db_clusters(&self, req: &DescribeClustersRequest) -> Result<Vec<DescCluster>> {
        let filters = convert::filters(&req.filters)?;
        let mut clusters = Vec::new();
        let mut marker = None;
        loop {
            let page = self
                .client
                .describe_db_clusters()
                .set_db_cluster_identifier(req.db_cluster_identifier.as_ref().map(ToString::to_string))
                .set_filters(filters.clone())
                .set_marker(marker)
                .send()
                .await
                .map_err(from_sdk)?;
            clusters.extend(
                page.db_clusters
                    .unwrap_or_default()
                    .into_iter()
                    .map(convert::cluster),
            );
            marker = next_marker(page.marker);
            if marker.is_none() {
                break;
            }
            tracing::trace!(count = clusters.len(), "Fetching next cluster page");
        }
        Ok(clusters)
    }

    async fn restore_db_cluster_from_snapshot(
        &self,
        req: &RestoreClusterFromSnapshotRequest,
    ) -> Result<()> {
        self.client
            .restore_db_cluster_from_snapshot()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .snapshot_identifier(req.snapshot_identifier.as_str())
            .set_engine(req.engine.clone())
            .set_engine_version(req.engine_version.clone())
            .set_vpc_security_group_ids(list(&req.vpc_security_group_ids))
            .set_db_subnet_group_name(req.db_subnet_group_name.clone())
            .set_availability_zones(list(&req.availability_zones))
            .set_publicly_accessible(req.publicly_accessible)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn restore_db_cluster_to_point_in_time(
        &self,
        req: &RestoreClusterPitrRequest,
    ) -> Result<()> {
        self.client
            .restore_db_cluster_to_point_in_time()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .source_db_cluster_identifier(req.source_db_cluster_identifier.as_str())
            .set_restore_to_time(req.restore_to_time.map(convert::from_utc))
            .use_latest_restorable_time(req.use_latest_restorable_time)
            .set_restore_type(req.restore_type.map(|t| t.as_str().to_string()))
            .set_backtrack_window(req.backtrack_window)
            .set_vpc_security_group_ids(list(&req.vpc_security_group_ids))
            .set_db_subnet_group_name(req.db_subnet_group_name.clone())
            .set_db_cluster_instance_class(req.db_cluster_instance_class.clone())
            .set_iops(req.iops)
            .set_publicly_accessible(req.publicly_accessible)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn create_db_cluster_snapshot(&self, req: &CreateClusterSnapshotRequest) -> Result<()> {
        self.client
            .create_db_cluster_snapshot()
            .db_cluster_identifier(req.db_cluster_identifier.as_str())
            .db_cluster_snapshot_identifier(req.db_cluster_snapshot_identifier.as_str())
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn describe_db_cluster_snapshots(
        &self,
        req: &DescribeClusterSnapshotsRequest,
    ) -> Result<Vec<DescClusterSnapshot>> {
        let mut snapshots = Vec::new();
        let mut marker = None;
        loop {
            let page = self
                .client
                .describe_db_cluster_snapshots()
                .set_db_cluster_identifier(req.db_cluster_identifier.as_ref().map(ToString::to_string))
                .set_db_cluster_snapshot_identifier(
                    req.db_cluster_snapshot_identifier.as_ref().map(ToString::to_string),
                )
                .set_marker(marker)
                .send()
                .await
                .map_err(from_sdk)?;
            snapshots.extend(
                page.db_cluster_snapshots
                    .unwrap_or_default()
                    .into_iter()
                    .map(convert::snapshot),
            );
            marker = next_marker(page.marker);
            if marker.is_none() {
                break;
            }
        }
        Ok(snapshots)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    async fn create_db_instance(&self, req: &CreateInstanceRequest) -> Result<()> {
        self.client
            .create_db_instance()
            .db_instance_identifier(req.db_instance_identifier.as_str())
            .set_db_instance_class(req.db_instance_class.clone())
            .set_engine(req.engine.clone())
            .set_engine_version(req.engine_version.clone())
            .set_db_cluster_identifier(req.db_cluster_identifier.as_ref().map(ToString::to_string))
            .set_master_username(req.master_username.clone())
            .set_master_user_password(req.master_user_password.clone())
            .set_manage_master_user_password(req.manage_master_user_password)
            .set_allocated_storage(req.allocated_storage)
            .set_iops(req.iops)
            .set_db_name(req.db_name.clone())
            .set_vpc_security_group_ids(list(&req.vpc_security_group_ids))
            .set_db_subnet_group_name(req.db_subnet_group_name.clone())
            .set_multi_az(req.multi_az)
            .set_availability_zone(req.availability_zone.clone())
            .set_publicly_accessible(req.publicly_accessible)
            .set_license_model(req.license_model.clone())
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn delete_db_instance(&self, req: &DeleteInstanceRequest) -> Result<()> {
        self.client
            .delete_db_instance()
            .db_instance_identifier(req.db_instance_identifier.as_str())
            .skip_final_snapshot(req.skip_final_snapshot)
            .set_final_db_snapshot_identifier(
                req.final_db_snapshot_identifier.as_ref().map(ToString::to_string),
            )
            .set_delete_automated_backups(req.delete_automated_backups)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn reboot_db_instance(&self, req: &RebootInstanceRequest) -> Result<()> {
        self.client
            .reboot_db_instance()
            .db_instance_identifier(req.db_instance_identifier.as_str())
            .set_force_failover(req.force_failover)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }

    async fn describe_db_instances(
        &self,
        req: &DescribeInstancesRequest,
    ) -> Result<Vec<DescInstance>> {
        let filters = convert::filters(&req.filters)?;
        let mut instances = Vec::new();
        let mut marker = None;
        loop {
            let page = self
                .client
                .describe_db_instances()
                .set_db_instance_identifier(
                    req.db_instance_identifier.as_ref().map(ToString::to_string),
                )
                .set_filters(filters.clone())
                .set_marker(marker)
                .send()
                .await
                .map_err(from_sdk)?;
            instances.extend(
                page.db_instances
                    .unwrap_or_default()
                    .into_iter()
                    .map(convert::instance),
            );
            marker = next_marker(page.marker);
            if marker.is_none() {
                break;
            }
            tracing::trace!(count = instances.len(), "Fetching next instance page");
        }
        Ok(instances)
    }

    async fn restore_db_instance_to_point_in_time(
        &self,
        req: &RestoreInstancePitrRequest,
    ) -> Result<()> {
        self.client
            .restore_db_instance_to_point_in_time()
            .target_db_instance_identifier(req.target_db_instance_identifier.as_str())
            .set_source_db_instance_identifier(
                req.source_db_instance_identifier.as_ref().map(ToString::to_string),
            )
            .set_source_dbi_resource_id(req.source_dbi_resource_id.clone())
            .set_source_db_instance_automated_backups_arn(
                req.source_db_instance_automated_backups_arn.clone(),
            )
            .set_restore_time(req.restore_time.map(convert::from_utc))
            .use_latest_restorable_time(req.use_latest_restorable_time)
            .set_db_instance_class(req.db_instance_class.clone())
            .set_iops(req.iops)
            .set_db_name(req.db_name.clone())
            .set_vpc_security_group_ids(list(&req.vpc_security_group_ids))
            .set_db_subnet_group_name(req.db_subnet_group_name.clone())
            .set_multi_az(req.multi_az)
            .set_availability_zone(req.availability_zone.clone())
            .set_publicly_accessible(req.publicly_accessible)
            .send()
            .await
            .map_err(from_sdk)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_marker_ends_pagination() {
        assert_eq!(next_marker(None), None);
        assert_eq!(next_marker(Some(String::new())), None);
        assert_eq!(next_marker(Some("page-2".to_string())), Some("page-2".to_string()));
    }
}

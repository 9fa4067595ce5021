//! Conversions between SDK shapes and the boundary types.

use aws_sdk_rds::primitives::DateTime as SdkDateTime;
use aws_sdk_rds::types as sdk;
use chrono::{DateTime, Utc};
use dbmesh_rds::request::Filter;
use dbmesh_rds::types::{
    ClusterMember, DescCluster, DescClusterSnapshot, DescInstance, Endpoint, ParameterGroupStatus,
    ReadReplicaStatus,
};
use dbmesh_rds::Result;

pub(crate) fn to_utc(t: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

pub(crate) fn from_utc(t: DateTime<Utc>) -> SdkDateTime {
    SdkDateTime::from_secs_and_nanos(t.timestamp(), t.timestamp_subsec_nanos())
}

/// `None` for an empty list so the parameter is left out of the request.
pub(crate) fn list(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

pub(crate) fn filters(filters: &[Filter]) -> Result<Option<Vec<sdk::Filter>>> {
    if filters.is_empty() {
        return Ok(None);
    }
    filters
        .iter()
        .map(|f| {
            Ok(sdk::Filter::builder()
                .name(f.name.clone())
                .set_values(Some(f.values.clone()))
                .build())
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

pub(crate) fn cluster(c: sdk::DbCluster) -> DescCluster {
    DescCluster {
        db_cluster_identifier: c.db_cluster_identifier.unwrap_or_default(),
        db_cluster_arn: c.db_cluster_arn.unwrap_or_default(),
        status: c.status.unwrap_or_default(),
        primary_endpoint: c.endpoint.unwrap_or_default(),
        reader_endpoint: c.reader_endpoint.unwrap_or_default(),
        custom_endpoints: c.custom_endpoints.unwrap_or_default(),
        port: c.port.unwrap_or_default(),
        members: c
            .db_cluster_members
            .unwrap_or_default()
            .into_iter()
            .map(|m| ClusterMember {
                db_instance_identifier: m.db_instance_identifier.unwrap_or_default(),
                is_cluster_writer: m.is_cluster_writer.unwrap_or_default(),
                db_cluster_parameter_group_status: m
                    .db_cluster_parameter_group_status
                    .unwrap_or_default(),
            })
            .collect(),
        availability_zones: c.availability_zones.unwrap_or_default(),
        character_set_name: c.character_set_name.unwrap_or_default(),
        db_cluster_parameter_group: c.db_cluster_parameter_group.unwrap_or_default(),
        read_replica_identifiers: c.read_replica_identifiers.unwrap_or_default(),
        replication_source_identifier: c.replication_source_identifier.unwrap_or_default(),
        deletion_protection: c.deletion_protection.unwrap_or_default(),
        cluster_create_time: c.cluster_create_time.as_ref().and_then(to_utc),
    }
}

pub(crate) fn instance(i: sdk::DbInstance) -> DescInstance {
    let endpoint = i.endpoint.map_or_else(Endpoint::default, |e| Endpoint {
        address: e.address.unwrap_or_default(),
        port: e.port.unwrap_or_default(),
    });
    DescInstance {
        db_instance_identifier: i.db_instance_identifier.unwrap_or_default(),
        db_instance_arn: i.db_instance_arn.unwrap_or_default(),
        db_instance_status: i.db_instance_status.unwrap_or_default(),
        db_cluster_identifier: i.db_cluster_identifier.unwrap_or_default(),
        endpoint,
        db_parameter_groups: i
            .db_parameter_groups
            .unwrap_or_default()
            .into_iter()
            .map(|g| ParameterGroupStatus {
                name: g.db_parameter_group_name.unwrap_or_default(),
                apply_status: g.parameter_apply_status.unwrap_or_default(),
            })
            .collect(),
        read_replica_source_db_instance_identifier: i
            .read_replica_source_db_instance_identifier
            .unwrap_or_default(),
        read_replica_db_instance_identifiers: i
            .read_replica_db_instance_identifiers
            .unwrap_or_default(),
        read_replica_db_cluster_identifiers: i
            .read_replica_db_cluster_identifiers
            .unwrap_or_default(),
        read_replica_status_infos: i
            .status_infos
            .unwrap_or_default()
            .into_iter()
            .map(|s| ReadReplicaStatus {
                message: s.message.unwrap_or_default(),
                normal: s.normal.unwrap_or_default(),
                status: s.status.unwrap_or_default(),
                status_type: s.status_type.unwrap_or_default(),
            })
            .collect(),
        character_set_name: i.character_set_name.unwrap_or_default(),
        timezone: i.timezone.unwrap_or_default(),
        secondary_availability_zone: i.secondary_availability_zone.unwrap_or_default(),
        deletion_protection: i.deletion_protection.unwrap_or_default(),
        instance_create_time: i.instance_create_time.as_ref().and_then(to_utc),
    }
}

pub(crate) fn snapshot(s: sdk::DbClusterSnapshot) -> DescClusterSnapshot {
    DescClusterSnapshot {
        db_cluster_snapshot_identifier: s.db_cluster_snapshot_identifier.unwrap_or_default(),
        db_cluster_identifier: s.db_cluster_identifier.unwrap_or_default(),
        db_cluster_snapshot_arn: s.db_cluster_snapshot_arn.unwrap_or_default(),
        status: s.status.unwrap_or_default(),
        engine: s.engine.unwrap_or_default(),
        snapshot_type: s.snapshot_type.unwrap_or_default(),
        allocated_storage: s.allocated_storage.unwrap_or_default(),
        percent_progress: s.percent_progress.unwrap_or_default(),
        snapshot_create_time: s.snapshot_create_time.as_ref().and_then(to_utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_keep_subsecond_precision() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(to_utc(&from_utc(at)), Some(at));
    }

    #[test]
    fn empty_lists_are_omitted() {
        assert_eq!(list(&[]), None);
        assert_eq!(list(&["sg-1".to_string()]), Some(vec!["sg-1".to_string()]));
        assert!(filters(&[]).unwrap().is_none());
    }

    #[test]
    fn cluster_projection_defaults_missing_fields() {
        let desc = cluster(
            sdk::DbCluster::builder()
                .db_cluster_identifier("db1")
                .status("available")
                .db_cluster_members(
                    sdk::DbClusterMember::builder()
                        .db_instance_identifier("db1-instance-1")
                        .is_cluster_writer(true)
                        .build(),
                )
                .build(),
        );
        assert_eq!(desc.db_cluster_identifier, "db1");
        assert_eq!(desc.port, 0);
        assert!(desc.cluster_create_time.is_none());
        assert_eq!(
            desc.writer().map(|m| m.db_instance_identifier.as_str()),
            Some("db1-instance-1")
        );
    }

    #[test]
    fn instance_projection_flattens_endpoint() {
        let desc = instance(
            sdk::DbInstance::builder()
                .db_instance_identifier("db1-instance-1")
                .db_cluster_identifier("db1")
                .endpoint(
                    sdk::Endpoint::builder()
                        .address("db1-instance-1.example.rds.amazonaws.com")
                        .port(3306)
                        .build(),
                )
                .build(),
        );
        assert_eq!(desc.endpoint.port, 3306);
        assert_eq!(desc.db_cluster_identifier, "db1");
        assert!(desc.db_parameter_groups.is_empty());
    }
}

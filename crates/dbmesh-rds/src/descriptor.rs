//! Declarative topology descriptor.
//!
//! A `DatabaseClass` is published by an external orchestration platform and
//! describes what kind of database to provision. It is read as plain input:
//! nothing here validates it against the control plane or persists it.
//!
//! Network placement travels in annotations rather than typed fields:
//!
//! | Annotation | Value |
//! |------------|-------|
//! | `databaseclass.database-mesh.io/vpc-security-group-ids` | comma-separated group ids |
//! | `databaseclass.database-mesh.io/vpc-subnet-group-name` | subnet group name |
//! | `databaseclass.database-mesh.io/availability-zones` | comma-separated zones |

use std::collections::BTreeMap;

use dbmesh_core::{ClusterId, InstanceId};
use serde::{Deserialize, Serialize};

use crate::aurora::AuroraConfig;
use crate::cluster::ClusterConfig;
use crate::instance::InstanceConfig;

/// Annotation carrying comma-separated VPC security group ids.
pub const ANNOTATION_VPC_SECURITY_GROUP_IDS: &str =
    "databaseclass.database-mesh.io/vpc-security-group-ids";

/// Annotation carrying the subnet group name.
pub const ANNOTATION_SUBNET_GROUP_NAME: &str = "databaseclass.database-mesh.io/vpc-subnet-group-name";

/// Annotation carrying comma-separated availability zones.
pub const ANNOTATION_AVAILABILITY_ZONES: &str = "databaseclass.database-mesh.io/availability-zones";

/// A declarative description of a database topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseClass {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// The requested topology.
    pub spec: DatabaseClassSpec,
}

/// The subset of object metadata the descriptor uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Free-form annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// What to provision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseClassSpec {
    /// Master user name of new databases.
    #[serde(default)]
    pub default_master_username: String,
    /// Let the control plane generate and manage the master password.
    #[serde(default)]
    pub auto_generated_master_password: bool,
    /// Standby in a second availability zone.
    #[serde(default, rename = "multiAZ")]
    pub multi_az: bool,
    /// Kind of topology.
    pub provisioner: Provisioner,
    /// Engine selection.
    pub engine: DatabaseEngine,
    /// Compute selection.
    #[serde(default)]
    pub instance: DatabaseInstance,
    /// Storage selection.
    #[serde(default)]
    pub storage: DatabaseStorage,
}

/// Kind of topology a descriptor provisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provisioner {
    /// One standalone instance.
    #[default]
    #[serde(rename = "AWSRdsInstance")]
    Instance,
    /// A cluster without derived members.
    #[serde(rename = "AWSRdsCluster")]
    Cluster,
    /// A cluster plus N derived member instances.
    #[serde(rename = "AWSRdsAurora")]
    Aurora,
}

impl std::fmt::Display for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Instance => "AWSRdsInstance",
            Self::Cluster => "AWSRdsCluster",
            Self::Aurora => "AWSRdsAurora",
        };
        f.write_str(s)
    }
}

/// Engine selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEngine {
    /// Engine name, e.g. `aurora-mysql`.
    pub name: String,
    /// Engine version.
    #[serde(default)]
    pub version: String,
    /// Engine mode, e.g. `provisioned`.
    #[serde(default)]
    pub mode: String,
}

/// Compute selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInstance {
    /// Instance class, e.g. `db.r6g.large`.
    #[serde(default)]
    pub class: String,
}

/// Storage selection. Zero means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStorage {
    /// Allocated storage in GiB.
    #[serde(default)]
    pub allocated_storage: i32,
    /// Provisioned IOPS.
    #[serde(default, rename = "iops")]
    pub iops: i32,
}

/// A topology configuration built from a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
    /// A standalone instance.
    Instance(InstanceConfig),
    /// A bare cluster.
    Cluster(ClusterConfig),
    /// A cluster with derived members.
    Aurora(AuroraConfig),
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn positive(n: i32) -> Option<i32> {
    (n > 0).then_some(n)
}

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl DatabaseClass {
    fn annotation(&self, key: &str) -> Option<&String> {
        self.metadata.annotations.get(key)
    }

    /// VPC security group ids from the annotations.
    #[must_use]
    pub fn vpc_security_group_ids(&self) -> Vec<String> {
        split_list(self.annotation(ANNOTATION_VPC_SECURITY_GROUP_IDS))
    }

    /// Subnet group name from the annotations.
    #[must_use]
    pub fn db_subnet_group_name(&self) -> Option<String> {
        self.annotation(ANNOTATION_SUBNET_GROUP_NAME)
            .map(|s| s.trim())
            .and_then(non_empty)
    }

    /// Availability zones from the annotations.
    #[must_use]
    pub fn availability_zones(&self) -> Vec<String> {
        split_list(self.annotation(ANNOTATION_AVAILABILITY_ZONES))
    }

    /// Build a standalone instance configuration.
    #[must_use]
    pub fn instance_config(&self, id: impl Into<InstanceId>) -> InstanceConfig {
        let spec = &self.spec;
        InstanceConfig {
            db_instance_class: non_empty(&spec.instance.class),
            engine: non_empty(&spec.engine.name),
            engine_version: non_empty(&spec.engine.version),
            master_username: non_empty(&spec.default_master_username),
            manage_master_user_password: spec.auto_generated_master_password.then_some(true),
            allocated_storage: positive(spec.storage.allocated_storage),
            iops: positive(spec.storage.iops),
            vpc_security_group_ids: self.vpc_security_group_ids(),
            db_subnet_group_name: self.db_subnet_group_name(),
            multi_az: Some(spec.multi_az),
            availability_zone: self.availability_zones().into_iter().next(),
            ..InstanceConfig::new(id)
        }
    }

    /// Build a bare cluster configuration.
    #[must_use]
    pub fn cluster_config(&self, id: impl Into<ClusterId>) -> ClusterConfig {
        let spec = &self.spec;
        ClusterConfig {
            engine: non_empty(&spec.engine.name),
            engine_version: non_empty(&spec.engine.version),
            engine_mode: non_empty(&spec.engine.mode),
            master_username: non_empty(&spec.default_master_username),
            manage_master_user_password: spec.auto_generated_master_password.then_some(true),
            vpc_security_group_ids: self.vpc_security_group_ids(),
            db_subnet_group_name: self.db_subnet_group_name(),
            availability_zones: self.availability_zones(),
            allocated_storage: positive(spec.storage.allocated_storage),
            iops: positive(spec.storage.iops),
            db_cluster_instance_class: non_empty(&spec.instance.class),
            ..ClusterConfig::new(id)
        }
    }

    /// Build an Aurora configuration with `instance_number` derived members.
    #[must_use]
    pub fn aurora_config(&self, id: impl Into<ClusterId>, instance_number: u32) -> AuroraConfig {
        let spec = &self.spec;
        AuroraConfig {
            instance_number,
            engine: non_empty(&spec.engine.name),
            engine_version: non_empty(&spec.engine.version),
            engine_mode: non_empty(&spec.engine.mode),
            master_username: non_empty(&spec.default_master_username),
            manage_master_user_password: spec.auto_generated_master_password.then_some(true),
            vpc_security_group_ids: self.vpc_security_group_ids(),
            db_subnet_group_name: self.db_subnet_group_name(),
            availability_zones: self.availability_zones(),
            db_instance_class: non_empty(&spec.instance.class),
            ..AuroraConfig::new(id)
        }
    }

    /// Build the configuration the provisioner asks for.
    ///
    /// `instance_number` only applies to Aurora topologies.
    #[must_use]
    pub fn topology(&self, id: &str, instance_number: u32) -> Topology {
        match self.spec.provisioner {
            Provisioner::Instance => Topology::Instance(self.instance_config(id)),
            Provisioner::Cluster => Topology::Cluster(self.cluster_config(id)),
            Provisioner::Aurora => Topology::Aurora(self.aurora_config(id, instance_number)),
        }
    }
}

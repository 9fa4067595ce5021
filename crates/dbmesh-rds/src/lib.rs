//! Lifecycle orchestration for managed relational database topologies.
//!
//! This crate turns declarative configuration into ordered control-plane
//! calls. It manages standalone clusters and instances, and Aurora
//! topologies made of one cluster plus N member instances whose names are
//! derived from the cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              DatabaseClass descriptor / CLI                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  ClusterConfig / InstanceConfig / AuroraConfig
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RdsService                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Cluster    │ │  Instance   │ │  Aurora             │    │
//! │  │  Manager    │ │  Manager    │ │  Orchestrator       │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  one request per verb, via CallGuard
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              ControlPlane (aws-sdk-rds / mock)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use dbmesh_rds::{Aurora, AuroraConfig, ControlPlane, RdsConfig, RdsService};
//!
//! # async fn example<C: ControlPlane + 'static>(client: Arc<C>) {
//! let service = RdsService::new(client, &RdsConfig::from_env());
//!
//! let config = AuroraConfig::new("db1")
//!     .engine("aurora-mysql")
//!     .db_instance_class("db.r6g.large")
//!     .instance_number(3)
//!     .skip_final_snapshot(true);
//!
//! match service.aurora(config).create().await {
//!     Ok(applied) => println!("created {} instances", applied.created_instances().len()),
//!     Err(aborted) => eprintln!("{aborted} (partial: {})", aborted.is_partial()),
//! }
//! # }
//! ```
//!
//! # Protocols
//!
//! Aurora protocols run their steps strictly in order and stop at the first
//! failure without retrying or rolling back. See the [`aurora`] module for
//! the step sequences and the [`lifecycle`] module for the topology states
//! reported on each outcome.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aurora;
pub mod client;
pub mod cluster;
pub mod descriptor;
pub mod error;
pub mod instance;
pub mod lifecycle;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod outcome;
pub mod request;
pub mod service;
pub mod types;

pub use aurora::{Aurora, AuroraConfig, AuroraOrchestrator};
pub use client::{CallGuard, ControlPlane, Operation};
pub use cluster::{Cluster, ClusterConfig, ClusterManager};
pub use descriptor::{DatabaseClass, Provisioner, Topology};
pub use error::{ApiError, ApiErrorKind, RdsError, Result};
pub use instance::{Instance, InstanceConfig, InstanceManager};
pub use lifecycle::TopologyState;
pub use outcome::{Aborted, Applied, Protocol, ProtocolResult, Step};
pub use request::{Filter, RestoreType};
pub use service::RdsService;
pub use types::{DescCluster, DescClusterSnapshot, DescInstance, RdsConfig};

pub use dbmesh_core::{ClusterId, InstanceId, SnapshotId};

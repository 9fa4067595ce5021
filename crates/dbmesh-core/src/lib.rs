//! Core types for dbmesh.
//!
//! This crate provides the identifiers shared by every dbmesh crate:
//!
//! - **Identifiers**: Strongly-typed names for clusters, instances, and snapshots
//! - **Member naming**: The deterministic `{cluster}-instance-{ordinal}` rule
//!
//! # Example
//!
//! ```
//! use dbmesh_core::{ClusterId, InstanceId};
//!
//! let cluster = ClusterId::new("db1");
//! let first = InstanceId::member(&cluster, 1);
//!
//! assert_eq!(first.as_str(), "db1-instance-1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;

pub use ids::{ClusterId, IdError, InstanceId, SnapshotId};

//! AWS adapter for dbmesh.
//!
//! This crate implements the [`ControlPlane`](dbmesh_rds::ControlPlane)
//! boundary over `aws-sdk-rds` and builds authenticated per-region sessions
//! over `aws-config`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              RdsService / AuroraOrchestrator                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  boundary requests
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RdsControlPlane                        │
//! │  ┌───────────────────┐ ┌──────────────┐ ┌────────────────┐  │
//! │  │ request → builder │ │ SDK → Desc*  │ │ error codes →  │  │
//! │  │ (set_* fields)    │ │ projections  │ │ ApiErrorKind   │  │
//! │  └───────────────────┘ └──────────────┘ └────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            aws-sdk-rds Client (one per region)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dbmesh_aws::Sessions;
//! use dbmesh_rds::{Aurora, AuroraConfig, RdsConfig, RdsService};
//!
//! # async fn example() {
//! let sessions = Sessions::builder().region("us-east-1").build().await;
//! let Some(control_plane) = sessions.control_plane("us-east-1") else {
//!     return;
//! };
//!
//! let service = RdsService::new(Arc::new(control_plane), &RdsConfig::from_env());
//! let described = service.aurora(AuroraConfig::new("db1")).describe().await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod control_plane;
mod convert;
mod error;
mod session;

pub use control_plane::RdsControlPlane;
pub use error::{classify_code, Result, SessionError};
pub use session::{SessionConfig, Sessions, SessionsBuilder};

//! Error types for database lifecycle operations.
//!
//! The control-plane boundary reports rejections as an [`ApiError`] carrying an
//! explicit [`ApiErrorKind`]. Protocol correctness depends on a few of those
//! kinds (cluster, instance, and snapshot not-found), so adapters must classify
//! their native errors into kinds rather than leaving callers to inspect
//! message strings.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A result type using `RdsError`.
pub type Result<T> = std::result::Result<T, RdsError>;

/// Classification of a control-plane rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The addressed cluster does not exist.
    ClusterNotFound,
    /// The addressed instance does not exist.
    InstanceNotFound,
    /// The addressed snapshot does not exist.
    SnapshotNotFound,
    /// A resource with the requested identifier already exists.
    AlreadyExists,
    /// An account or regional quota would be exceeded.
    QuotaExceeded,
    /// The resource is not in a state that allows the operation.
    InvalidState,
    /// A parameter or parameter combination was rejected.
    InvalidParameter,
    /// The request was throttled.
    Throttled,
    /// Any other rejection.
    Other,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClusterNotFound => "cluster not found",
            Self::InstanceNotFound => "instance not found",
            Self::SnapshotNotFound => "snapshot not found",
            Self::AlreadyExists => "already exists",
            Self::QuotaExceeded => "quota exceeded",
            Self::InvalidState => "invalid state",
            Self::InvalidParameter => "invalid parameter",
            Self::Throttled => "throttled",
            Self::Other => "rejected",
        };
        f.write_str(s)
    }
}

/// A classified rejection returned by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({code}): {message}")]
pub struct ApiError {
    /// The classified kind of the rejection.
    pub kind: ApiErrorKind,
    /// The control plane's own error code.
    pub code: String,
    /// The human-readable message from the control plane.
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    #[must_use]
    pub fn new(kind: ApiErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur in database lifecycle operations.
#[derive(Debug, Error)]
pub enum RdsError {
    /// A local precondition failed before any control-plane call was made.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The control plane rejected the call.
    #[error("control plane error: {0}")]
    Api(#[from] ApiError),

    /// The call never produced a control-plane answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not complete within the configured deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The control-plane operation that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The call was cancelled by the caller.
    #[error("{operation} cancelled")]
    Cancelled {
        /// The control-plane operation that was cancelled.
        operation: &'static str,
    },

    /// The operation has no defined behavior.
    #[error("{0} is not implemented")]
    Unsupported(&'static str),
}

impl RdsError {
    /// Returns the API error kind if the control plane rejected the call.
    #[must_use]
    pub const fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Api(err) => Some(err.kind),
            _ => None,
        }
    }

    /// Returns true if the control plane reported the cluster as absent.
    #[must_use]
    pub fn is_cluster_not_found(&self) -> bool {
        self.api_kind() == Some(ApiErrorKind::ClusterNotFound)
    }

    /// Returns true if the control plane reported the instance as absent.
    #[must_use]
    pub fn is_instance_not_found(&self) -> bool {
        self.api_kind() == Some(ApiErrorKind::InstanceNotFound)
    }

    /// Returns true if the control plane reported the snapshot as absent.
    #[must_use]
    pub fn is_snapshot_not_found(&self) -> bool {
        self.api_kind() == Some(ApiErrorKind::SnapshotNotFound)
    }

    /// Returns true if this error might be resolved by retrying.
    ///
    /// Nothing in this crate retries; this is advice for callers.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Api(err) => err.kind == ApiErrorKind::Throttled,
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Validation(_) | Self::Cancelled { .. } | Self::Unsupported(_) => false,
        }
    }
}

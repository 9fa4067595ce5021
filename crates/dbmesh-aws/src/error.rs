//! Error types for the AWS adapter.
//!
//! Service rejections are classified into [`ApiErrorKind`] by error code here,
//! so nothing above the adapter ever inspects AWS error envelopes.

use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use dbmesh_rds::{ApiError, ApiErrorKind, RdsError};
use thiserror::Error;

/// Errors that can occur while building sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A region name was empty.
    #[error("region must not be empty")]
    EmptyRegion,

    /// Only one half of a static key pair was supplied.
    #[error("incomplete static credentials for region {0}")]
    IncompleteCredentials(String),
}

/// A specialized Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Classify an RDS service error code.
#[must_use]
pub fn classify_code(code: &str) -> ApiErrorKind {
    match code {
        "DBClusterNotFoundFault" => ApiErrorKind::ClusterNotFound,
        "DBInstanceNotFound" | "DBInstanceNotFoundFault" => ApiErrorKind::InstanceNotFound,
        "DBClusterSnapshotNotFoundFault" | "DBSnapshotNotFound" => ApiErrorKind::SnapshotNotFound,
        "DBClusterAlreadyExistsFault"
        | "DBInstanceAlreadyExists"
        | "DBClusterSnapshotAlreadyExistsFault"
        | "DBSnapshotAlreadyExists" => ApiErrorKind::AlreadyExists,
        "DBClusterQuotaExceededFault"
        | "InstanceQuotaExceeded"
        | "StorageQuotaExceeded"
        | "SnapshotQuotaExceeded" => ApiErrorKind::QuotaExceeded,
        "InvalidDBClusterStateFault"
        | "InvalidDBInstanceState"
        | "InvalidDBClusterSnapshotStateFault"
        | "InvalidGlobalClusterStateFault" => ApiErrorKind::InvalidState,
        "InvalidParameterValue" | "InvalidParameterCombination" | "MissingParameter" => {
            ApiErrorKind::InvalidParameter
        }
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded" => ApiErrorKind::Throttled,
        _ => ApiErrorKind::Other,
    }
}

/// Convert an SDK error into the boundary error.
///
/// Service errors become [`RdsError::Api`]; anything that never reached the
/// service (construction, dispatch, response parsing) becomes
/// [`RdsError::Transport`].
pub(crate) fn from_sdk<E, R>(err: SdkError<E, R>) -> RdsError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    if let SdkError::ServiceError(service) = &err {
        let inner = service.err();
        let code = inner.code().unwrap_or("Unknown");
        return RdsError::Api(ApiError::new(
            classify_code(code),
            code,
            inner.message().unwrap_or_default(),
        ));
    }
    RdsError::Transport(DisplayErrorContext(&err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        assert_eq!(classify_code("DBClusterNotFoundFault"), ApiErrorKind::ClusterNotFound);
        assert_eq!(classify_code("DBInstanceNotFound"), ApiErrorKind::InstanceNotFound);
        assert_eq!(
            classify_code("DBClusterSnapshotNotFoundFault"),
            ApiErrorKind::SnapshotNotFound
        );
    }

    #[test]
    fn other_codes() {
        assert_eq!(classify_code("DBInstanceAlreadyExists"), ApiErrorKind::AlreadyExists);
        assert_eq!(classify_code("InvalidDBClusterStateFault"), ApiErrorKind::InvalidState);
        assert_eq!(classify_code("Throttling"), ApiErrorKind::Throttled);
        assert_eq!(classify_code("SomethingNew"), ApiErrorKind::Other);
    }

    #[test]
    fn classified_errors_drive_predicates() {
        let err = RdsError::from(ApiError::new(
            classify_code("DBClusterNotFoundFault"),
            "DBClusterNotFoundFault",
            "DBCluster db1 not found.",
        ));
        assert!(err.is_cluster_not_found());
        assert!(!err.is_retriable());
    }
}

//! The control-plane boundary.
//!
//! [`ControlPlane`] is the ordered, fallible request/response surface the
//! lifecycle managers are written against. Adapters (the AWS SDK adapter in
//! `dbmesh-aws`, or [`MockControlPlane`](crate::mock::MockControlPlane) in
//! tests) implement it and classify their native errors into
//! [`ApiErrorKind`](crate::ApiErrorKind)s.
//!
//! Every call made by a manager goes through a [`CallGuard`], which races the
//! call against the caller's cancellation token and an optional deadline.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{RdsError, Result};
use crate::request::{
    CreateClusterRequest, CreateClusterSnapshotRequest, CreateInstanceRequest,
    DeleteClusterRequest, DeleteInstanceRequest, DescribeClusterSnapshotsRequest,
    DescribeClustersRequest, DescribeInstancesRequest, FailoverClusterRequest,
    FailoverGlobalClusterRequest, RebootClusterRequest, RebootInstanceRequest,
    RestoreClusterFromSnapshotRequest, RestoreClusterPitrRequest, RestoreInstancePitrRequest,
};
use crate::types::{DescCluster, DescClusterSnapshot, DescInstance, RdsConfig};

/// Single-resource verbs of the remote control plane.
///
/// Implementations must report rejections as [`RdsError::Api`] with an
/// accurate kind; the orchestrator's idempotence depends on the not-found
/// kinds in particular.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a cluster shell.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn create_db_cluster(&self, req: &CreateClusterRequest) -> Result<()>;

    /// Delete a cluster. Fails while member instances exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn delete_db_cluster(&self, req: &DeleteClusterRequest) -> Result<()>;

    /// Reboot every instance of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn reboot_db_cluster(&self, req: &RebootClusterRequest) -> Result<()>;

    /// Fail a cluster over to another writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn failover_db_cluster(&self, req: &FailoverClusterRequest) -> Result<()>;

    /// Fail a global cluster over to a secondary cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn failover_global_cluster(&self, req: &FailoverGlobalClusterRequest) -> Result<()>;

    /// Describe clusters.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn describe_db_clusters(&self, req: &DescribeClustersRequest) -> Result<Vec<DescCluster>>;

    /// Restore a cluster shell from a snapshot. No instances are restored.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn restore_db_cluster_from_snapshot(
        &self,
        req: &RestoreClusterFromSnapshotRequest,
    ) -> Result<()>;

    /// Restore a cluster shell to a point in time. No instances are restored.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn restore_db_cluster_to_point_in_time(
        &self,
        req: &RestoreClusterPitrRequest,
    ) -> Result<()>;

    /// Take a manual cluster snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn create_db_cluster_snapshot(&self, req: &CreateClusterSnapshotRequest) -> Result<()>;

    /// Describe cluster snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn describe_db_cluster_snapshots(
        &self,
        req: &DescribeClusterSnapshotsRequest,
    ) -> Result<Vec<DescClusterSnapshot>>;

    /// Create an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn create_db_instance(&self, req: &CreateInstanceRequest) -> Result<()>;

    /// Delete an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn delete_db_instance(&self, req: &DeleteInstanceRequest) -> Result<()>;

    /// Reboot an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn reboot_db_instance(&self, req: &RebootInstanceRequest) -> Result<()>;

    /// Describe instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn describe_db_instances(
        &self,
        req: &DescribeInstancesRequest,
    ) -> Result<Vec<DescInstance>>;

    /// Restore a standalone instance to a point in time.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane rejects the request.
    async fn restore_db_instance_to_point_in_time(
        &self,
        req: &RestoreInstancePitrRequest,
    ) -> Result<()>;
}

/// Names of the control-plane verbs, as used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `CreateDBCluster`
    CreateDbCluster,
    /// `DeleteDBCluster`
    DeleteDbCluster,
    /// `RebootDBCluster`
    RebootDbCluster,
    /// `FailoverDBCluster`
    FailoverDbCluster,
    /// `FailoverGlobalCluster`
    FailoverGlobalCluster,
    /// `DescribeDBClusters`
    DescribeDbClusters,
    /// `RestoreDBClusterFromSnapshot`
    RestoreDbClusterFromSnapshot,
    /// `RestoreDBClusterToPointInTime`
    RestoreDbClusterToPointInTime,
    /// `CreateDBClusterSnapshot`
    CreateDbClusterSnapshot,
    /// `DescribeDBClusterSnapshots`
    DescribeDbClusterSnapshots,
    /// `CreateDBInstance`
    CreateDbInstance,
    /// `DeleteDBInstance`
    DeleteDbInstance,
    /// `RebootDBInstance`
    RebootDbInstance,
    /// `DescribeDBInstances`
    DescribeDbInstances,
    /// `RestoreDBInstanceToPointInTime`
    RestoreDbInstanceToPointInTime,
}

impl Operation {
    /// The control plane's name for the verb.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDbCluster => "CreateDBCluster",
            Self::DeleteDbCluster => "DeleteDBCluster",
            Self::RebootDbCluster => "RebootDBCluster",
            Self::FailoverDbCluster => "FailoverDBCluster",
            Self::FailoverGlobalCluster => "FailoverGlobalCluster",
            Self::DescribeDbClusters => "DescribeDBClusters",
            Self::RestoreDbClusterFromSnapshot => "RestoreDBClusterFromSnapshot",
            Self::RestoreDbClusterToPointInTime => "RestoreDBClusterToPointInTime",
            Self::CreateDbClusterSnapshot => "CreateDBClusterSnapshot",
            Self::DescribeDbClusterSnapshots => "DescribeDBClusterSnapshots",
            Self::CreateDbInstance => "CreateDBInstance",
            Self::DeleteDbInstance => "DeleteDBInstance",
            Self::RebootDbInstance => "RebootDBInstance",
            Self::DescribeDbInstances => "DescribeDBInstances",
            Self::RestoreDbInstanceToPointInTime => "RestoreDBInstanceToPointInTime",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies the caller's cancellation token and per-call deadline.
///
/// A guard is cheap to clone; clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct CallGuard {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl CallGuard {
    /// Create a guard with the given token and optional deadline.
    #[must_use]
    pub const fn new(cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self { cancel, timeout }
    }

    /// Create a guard with a fresh token and the configured deadline.
    #[must_use]
    pub fn from_config(config: &RdsConfig) -> Self {
        Self::new(CancellationToken::new(), config.call_timeout())
    }

    /// Replace the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the per-call deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The token observed by this guard.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The per-call deadline, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one control-plane call under the guard.
    ///
    /// A call is never started once the token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RdsError::Cancelled` or `RdsError::Timeout` when the guard
    /// wins the race, otherwise whatever the call returns.
    pub async fn run<T, F>(&self, operation: Operation, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let cancelled = RdsError::Cancelled {
            operation: operation.as_str(),
        };
        if self.cancel.is_cancelled() {
            return Err(cancelled);
        }

        let bounded = async {
            match self.timeout {
                Some(after) => match tokio::time::timeout(after, call).await {
                    Ok(result) => result,
                    Err(_) => Err(RdsError::Timeout {
                        operation: operation.as_str(),
                        after,
                    }),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(cancelled),
            result = bounded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ApiErrorKind};

    #[tokio::test]
    async fn passes_results_through() {
        let guard = CallGuard::default();
        let ok: Result<u32> = guard.run(Operation::CreateDbCluster, async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<()> = guard
            .run(Operation::CreateDbCluster, async {
                Err(ApiError::new(ApiErrorKind::AlreadyExists, "DBClusterAlreadyExistsFault", "db1").into())
            })
            .await;
        assert_eq!(err.unwrap_err().api_kind(), Some(ApiErrorKind::AlreadyExists));
    }

    #[tokio::test]
    async fn cancelled_token_skips_call() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = CallGuard::default().with_cancellation(token);

        let mut started = false;
        let result: Result<()> = guard
            .run(Operation::DeleteDbInstance, async {
                started = true;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(RdsError::Cancelled {
                operation: "DeleteDBInstance"
            })
        ));
        assert!(!started);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_elapses() {
        let guard = CallGuard::default().with_timeout(Some(Duration::from_secs(5)));
        let result: Result<()> = guard
            .run(Operation::CreateDbInstance, std::future::pending())
            .await;

        match result {
            Err(RdsError::Timeout { operation, after }) => {
                assert_eq!(operation, "CreateDBInstance");
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_in_flight_call() {
        let token = CancellationToken::new();
        let guard = CallGuard::default().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let result: Result<()> = guard
            .run(Operation::RestoreDbClusterFromSnapshot, std::future::pending())
            .await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(RdsError::Cancelled { .. })));
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::DescribeDbInstances.to_string(), "DescribeDBInstances");
    }
}

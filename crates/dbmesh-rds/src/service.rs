//! Service facade.
//!
//! `RdsService` holds one shared control-plane handle and call guard and hands
//! out lifecycle managers bound to a configuration. Managers are cheap: they
//! share the client and guard, so one service can drive many topologies.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::aurora::{AuroraConfig, AuroraOrchestrator};
use crate::client::{CallGuard, ControlPlane};
use crate::cluster::{ClusterConfig, ClusterManager};
use crate::instance::{InstanceConfig, InstanceManager};
use crate::types::RdsConfig;

/// Entry point for cluster, instance, and Aurora operations.
pub struct RdsService<C: ControlPlane> {
    client: Arc<C>,
    guard: CallGuard,
}

impl<C: ControlPlane> Clone for RdsService<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            guard: self.guard.clone(),
        }
    }
}

impl<C: ControlPlane + 'static> RdsService<C> {
    /// Create a new service.
    #[must_use]
    pub fn new(client: Arc<C>, config: &RdsConfig) -> Self {
        Self {
            client,
            guard: CallGuard::from_config(config),
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(client: Arc<C>) -> Self {
        Self::new(client, &RdsConfig::default())
    }

    /// Cancel every call made through this service when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.guard = self.guard.with_cancellation(token);
        self
    }

    /// Get a reference to the control plane.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get the call guard shared by all managers.
    #[must_use]
    pub const fn guard(&self) -> &CallGuard {
        &self.guard
    }

    /// A manager for one cluster.
    #[must_use]
    pub fn cluster(&self, config: ClusterConfig) -> ClusterManager<C> {
        ClusterManager::new(Arc::clone(&self.client), self.guard.clone(), config)
    }

    /// A manager for one instance.
    #[must_use]
    pub fn instance(&self, config: InstanceConfig) -> InstanceManager<C> {
        InstanceManager::new(Arc::clone(&self.client), self.guard.clone(), config)
    }

    /// An orchestrator for one Aurora topology.
    #[must_use]
    pub fn aurora(&self, config: AuroraConfig) -> AuroraOrchestrator<C> {
        AuroraOrchestrator::new(Arc::clone(&self.client), self.guard.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aurora::Aurora;
    use crate::client::Operation;
    use crate::cluster::Cluster;
    use crate::error::RdsError;
    use crate::instance::Instance;
    use crate::mock::MockControlPlane;
    use std::time::Duration;

    #[test]
    fn guard_follows_config() {
        let service = RdsService::new(
            Arc::new(MockControlPlane::new()),
            &RdsConfig {
                call_timeout_seconds: 0,
            },
        );
        assert_eq!(service.guard().timeout(), None);

        let service = RdsService::with_defaults(Arc::new(MockControlPlane::new()));
        assert_eq!(service.guard().timeout(), Some(Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn managers_share_client() {
        let mock = Arc::new(MockControlPlane::new());
        let service = RdsService::with_defaults(Arc::clone(&mock));

        service.cluster(ClusterConfig::new("shared")).create().await.unwrap();
        service
            .instance(InstanceConfig::new("shared-writer").cluster("shared"))
            .create()
            .await
            .unwrap();
        let desc = service
            .aurora(AuroraConfig::new("shared"))
            .describe()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(desc.members.len(), 1);
        assert_eq!(service.client().call_count(), 3);
        assert_eq!(mock.targets(Operation::DescribeDbClusters), vec!["shared".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_reaches_managers() {
        let token = CancellationToken::new();
        let mock = Arc::new(MockControlPlane::new());
        let service = RdsService::with_defaults(Arc::clone(&mock)).with_cancellation(token.clone());
        token.cancel();

        let err = service
            .cluster(ClusterConfig::new("db1"))
            .create()
            .await
            .unwrap_err();
        assert!(matches!(err, RdsError::Cancelled { .. }));
        assert_eq!(mock.call_count(), 0);
    }
}

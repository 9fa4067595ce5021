//! Per-region session construction.
//!
//! A [`Sessions`] value holds one loaded SDK configuration per region. Regions
//! are registered on a [`SessionsBuilder`] either with a static key pair or
//! with the default provider chain (environment, profile, IMDS, and so on).

use std::collections::BTreeMap;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_rds::config::Credentials;

use crate::control_plane::RdsControlPlane;
use crate::error::{Result, SessionError};

/// Provider name reported by static credentials.
const STATIC_PROVIDER: &str = "dbmesh-static";

/// How one region authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Region name, e.g. `us-east-1`.
    pub region: String,
    /// Static access key id, `None` for the default provider chain.
    pub access_key_id: Option<String>,
    /// Static secret access key, `None` for the default provider chain.
    pub secret_access_key: Option<String>,
}

impl SessionConfig {
    /// A region using the default provider chain.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// A region using a static key pair.
    #[must_use]
    pub fn with_static(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key_id: Some(access_key_id.into()),
            secret_access_key: Some(secret_access_key.into()),
        }
    }

    /// The static credentials of this region, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IncompleteCredentials` if only one half of the
    /// key pair is set.
    pub fn credentials(&self) -> Result<Option<Credentials>> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(ak), Some(sk)) => Ok(Some(Credentials::new(
                ak.clone(),
                sk.clone(),
                None,
                None,
                STATIC_PROVIDER,
            ))),
            (None, None) => Ok(None),
            _ => Err(SessionError::IncompleteCredentials(self.region.clone())),
        }
    }

    /// Load the SDK configuration for this region.
    ///
    /// # Errors
    ///
    /// Returns an error if the region is empty or the key pair is incomplete.
    pub async fn load(&self) -> Result<SdkConfig> {
        if self.region.trim().is_empty() {
            return Err(SessionError::EmptyRegion);
        }
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));
        if let Some(credentials) = self.credentials()? {
            loader = loader.credentials_provider(credentials);
        }
        Ok(loader.load().await)
    }
}

/// Registers regions for [`Sessions`].
#[derive(Debug, Clone, Default)]
pub struct SessionsBuilder {
    regions: Vec<SessionConfig>,
}

impl SessionsBuilder {
    /// Register a region with a static key pair.
    #[must_use]
    pub fn credential(
        mut self,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.regions.push(SessionConfig::with_static(
            region,
            access_key_id,
            secret_access_key,
        ));
        self
    }

    /// Register a region using the default provider chain.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(SessionConfig::new(region));
        self
    }

    /// Register a prepared session configuration.
    #[must_use]
    pub fn session(mut self, config: SessionConfig) -> Self {
        self.regions.push(config);
        self
    }

    /// Load every registered region.
    ///
    /// A region registered twice keeps its last registration. A region that
    /// fails to load is skipped with a warning so the remaining regions stay
    /// usable.
    pub async fn build(self) -> Sessions {
        let mut configs = BTreeMap::new();
        for session in self.regions {
            match session.load().await {
                Ok(config) => {
                    tracing::debug!(region = %session.region, "Loaded session");
                    configs.insert(session.region, config);
                }
                Err(e) => {
                    tracing::warn!(region = %session.region, error = %e, "Skipping region");
                }
            }
        }
        Sessions { configs }
    }
}

/// Loaded SDK configurations keyed by region.
#[derive(Debug, Clone, Default)]
pub struct Sessions {
    configs: BTreeMap<String, SdkConfig>,
}

impl Sessions {
    /// Start registering regions.
    #[must_use]
    pub fn builder() -> SessionsBuilder {
        SessionsBuilder::default()
    }

    /// The SDK configuration of a region.
    #[must_use]
    pub fn get(&self, region: &str) -> Option<&SdkConfig> {
        self.configs.get(region)
    }

    /// An RDS control plane for a region.
    #[must_use]
    pub fn control_plane(&self, region: &str) -> Option<RdsControlPlane> {
        self.get(region).map(RdsControlPlane::new)
    }

    /// Loaded regions, sorted.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    /// Number of loaded regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns true if no region loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

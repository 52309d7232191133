// Collaborator interfaces injected into the orchestrator

use async_trait::async_trait;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::workflow::errors::ClientError;
use crate::workflow::types::*;

/// Chain operations the workflow depends on
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit the deployment; `None` when the chain accepted the call but no
    /// deployment identity could be read back
    async fn create_deployment(
        &self,
        spec: &WorkloadSpecification,
    ) -> Result<Option<DeploymentIdentity>, ClientError>;

    /// Accept a bid; `None` when no lease came out of it
    async fn create_lease(&self, bid: &BidSelection) -> Result<Option<LeaseRecord>, ClientError>;

    /// Deliver the manifest to the leased provider
    async fn send_manifest(&self, submission: &ManifestSubmission) -> Result<(), ClientError>;

    /// Open bids for a deployment, in the order the chain returns them
    async fn list_bids(&self, deployment: &DeploymentIdentity) -> Result<Vec<Bid>, ClientError>;
}

/// Read-only access to the authenticated signer
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait SignerProvider: Send + Sync {
    fn address(&self) -> Option<String>;
}

/// Receives navigation requests when the workflow moves between locations
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Navigator: Send + Sync {
    fn navigate(&self, request: &NavigationRequest);
}

/// Readiness gate consulted while in preflight
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait PreflightCheck: Send + Sync {
    async fn check(&self, signer: Option<String>) -> Result<PreflightReport, ClientError>;
}

/// Signer whose address is fixed when it is built
#[derive(Debug, Clone, Default)]
pub struct StaticSigner {
    address: Option<String>,
}

impl StaticSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self { address: None }
    }
}

impl SignerProvider for StaticSigner {
    fn address(&self) -> Option<String> {
        self.address.clone().filter(|a| !a.is_empty())
    }
}

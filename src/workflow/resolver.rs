// Resumption resolver - derives the starting step from route identifiers

use tracing::{debug, warn};

use crate::storage::DeploymentStore;
use crate::workflow::errors::WorkflowError;
use crate::workflow::types::*;

/// Where a (re)entered workflow should start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub step: WorkflowStep,
    pub intent_id: Option<String>,
    pub deployment: Option<DeploymentIdentity>,
}

impl Resolution {
    pub fn configuring() -> Self {
        Self {
            step: WorkflowStep::Configuring,
            intent_id: None,
            deployment: None,
        }
    }
}

/// Resolution plus whatever the store still knows about the deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedResolution {
    pub resolution: Resolution,
    pub saved: Option<SavedDeployment>,
}

pub struct ResumptionResolver;

impl ResumptionResolver {
    /// Pure resolution; the same inputs always produce the same result.
    ///
    /// A dseq wins over an intent id. Deriving the identity needs the
    /// authenticated owner, so a dseq without one is refused.
    pub fn resolve(params: &RouteParams, owner: Option<&str>) -> Result<Resolution, WorkflowError> {
        match (&params.intent_id, &params.dseq) {
            (_, Some(dseq)) => {
                let owner = owner
                    .filter(|o| !o.is_empty())
                    .ok_or(WorkflowError::PreconditionMissing {
                        action: "resume deployment",
                        missing: "signer address",
                    })?;
                debug!(dseq = %dseq, owner = %owner, "Resolved deployment identity from route");
                Ok(Resolution {
                    step: WorkflowStep::ProviderSelecting,
                    intent_id: params.intent_id.clone(),
                    deployment: Some(DeploymentIdentity::new(owner, dseq.clone())),
                })
            }
            (Some(intent_id), None) => Ok(Resolution {
                step: WorkflowStep::PreflightChecking,
                intent_id: Some(intent_id.clone()),
                deployment: None,
            }),
            (None, None) => Ok(Resolution::configuring()),
        }
    }

    /// Resolve, then load the saved specification for a resolved deployment.
    /// A missing record is not an error; an unreadable one is.
    pub async fn resolve_with_store(
        params: &RouteParams,
        owner: Option<&str>,
        store: &dyn DeploymentStore,
    ) -> Result<HydratedResolution, WorkflowError> {
        let resolution = Self::resolve(params, owner)?;
        let saved = match &resolution.deployment {
            Some(deployment) => {
                let saved = store.get(&deployment.dseq).await?;
                if saved.is_none() {
                    warn!(dseq = %deployment.dseq, "No saved specification for deployment");
                }
                saved
            }
            None => None,
        };
        Ok(HydratedResolution { resolution, saved })
    }
}

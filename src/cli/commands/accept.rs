use anyhow::{anyhow, Result};

use super::print_state;
use crate::workflow::{
    BidSelection, Collaborators, RouteParams, WorkflowError, WorkflowOrchestrator,
};

pub struct AcceptCommand {
    pub dseq: String,
    pub provider: String,
    pub gseq: u32,
    pub oseq: u32,
    collaborators: Collaborators,
}

impl AcceptCommand {
    pub fn new(
        dseq: String,
        provider: String,
        gseq: u32,
        oseq: u32,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            dseq,
            provider,
            gseq,
            oseq,
            collaborators,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let params = RouteParams::from_raw(None, Some(self.dseq.as_str()))?;
        let mut orchestrator =
            WorkflowOrchestrator::resume(self.collaborators.clone(), &params).await?;
        let deployment = orchestrator
            .state()
            .deployment
            .ok_or_else(|| anyhow!("Deployment {} could not be resolved", self.dseq))?;

        let bid = BidSelection::for_deployment(&deployment, self.provider.clone())
            .with_group(self.gseq, self.oseq);

        println!(
            "🤝 Accepting bid from {} for deployment {}",
            bid.provider, deployment.dseq
        );
        let result = orchestrator.accept_bid(bid).await;
        print_state(&orchestrator.state());

        match result {
            Ok(lease) => {
                println!();
                println!(
                    "✅ Manifest delivered to {}; deployment {} is live",
                    lease.provider, lease.deployment.dseq
                );
                Ok(())
            }
            Err(WorkflowError::PreconditionMissing {
                missing: "workload specification",
                ..
            }) => Err(anyhow!(
                "No saved SDL for deployment {}; it was not created from this machine",
                self.dseq
            )),
            Err(e) => Err(e.into()),
        }
    }
}

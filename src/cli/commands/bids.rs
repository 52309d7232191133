use anyhow::{anyhow, Result};

use crate::workflow::{Collaborators, RouteParams, WorkflowOrchestrator};

pub struct BidsCommand {
    pub dseq: String,
    collaborators: Collaborators,
}

impl BidsCommand {
    pub fn new(dseq: String, collaborators: Collaborators) -> Self {
        Self { dseq, collaborators }
    }

    pub async fn execute(&self) -> Result<()> {
        let params = RouteParams::from_raw(None, Some(self.dseq.as_str()))?;
        let orchestrator = WorkflowOrchestrator::resume(self.collaborators.clone(), &params).await?;
        let deployment = orchestrator
            .state()
            .deployment
            .ok_or_else(|| anyhow!("Deployment {} could not be resolved", self.dseq))?;

        print!("🔍 Fetching open bids for deployment {}... ", deployment.dseq);
        std::io::Write::flush(&mut std::io::stdout())?;
        let bids = self.collaborators.chain.list_bids(&deployment).await?;
        println!("✅");
        println!();

        if bids.is_empty() {
            println!("📋 No open bids yet");
            println!("   💡 Providers usually bid within a minute; try again shortly");
            return Ok(());
        }

        println!("💰 {} open bid(s):", bids.len());
        for bid in &bids {
            println!(
                "   {}  {} per block  (gseq {}, oseq {})",
                bid.id.provider, bid.price, bid.id.gseq, bid.id.oseq
            );
        }
        println!();
        println!(
            "💡 Accept one with: deploy-flow accept --dseq {} --provider <address>",
            deployment.dseq
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDeploymentStore;
    use crate::workflow::traits::{MockChainClient, MockNavigator, MockPreflightCheck};
    use crate::workflow::StaticSigner;
    use std::sync::Arc;

    fn collaborators(chain: MockChainClient, signer: StaticSigner) -> Collaborators {
        Collaborators {
            chain: Arc::new(chain),
            store: Arc::new(InMemoryDeploymentStore::new()),
            signer: Arc::new(signer),
            navigator: Arc::new(MockNavigator::new()),
            preflight: Arc::new(MockPreflightCheck::new()),
        }
    }

    #[tokio::test]
    async fn test_bids_queries_resolved_deployment() {
        let mut chain = MockChainClient::new();
        chain
            .expect_list_bids()
            .withf(|d| d.owner == "akash1owner" && d.dseq.as_str() == "12")
            .times(1)
            .returning(|_| Ok(Vec::new()));

        BidsCommand::new("12".to_string(), collaborators(chain, StaticSigner::new("akash1owner")))
            .execute()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bids_without_signer_fails_before_query() {
        let mut chain = MockChainClient::new();
        chain.expect_list_bids().never();

        let command = BidsCommand::new("12".to_string(), collaborators(chain, StaticSigner::anonymous()));
        assert!(command.execute().await.is_err());
    }
}

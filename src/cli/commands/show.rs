use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::storage::DeploymentStore;
use crate::workflow::Dseq;

pub struct ShowCommand {
    pub dseq: String,
    store: Arc<dyn DeploymentStore>,
}

impl ShowCommand {
    pub fn new(dseq: String, store: Arc<dyn DeploymentStore>) -> Self {
        Self { dseq, store }
    }

    pub async fn execute(&self) -> Result<()> {
        let dseq = Dseq::new(self.dseq.clone())?;
        let saved = self
            .store
            .get(&dseq)
            .await?
            .ok_or_else(|| anyhow!("No saved record for deployment {dseq}"))?;

        println!("📦 Deployment {dseq}");
        println!("   🏷️  Name: {}", saved.name);
        if let Some(owner) = &saved.owner {
            println!("   👤 Owner: {owner}");
        }
        if let Some(created_at) = saved.created_at {
            println!("   🕒 Created: {}", created_at.to_rfc3339());
        }
        println!();
        println!("{}", saved.sdl);
        Ok(())
    }
}

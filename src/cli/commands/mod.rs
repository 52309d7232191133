use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DeployFlowConfig;
use crate::external::{
    keyring_signer, AutoApprove, CliChainClient, CliPreflight, ConsoleApprover, ProcessCommandExecutor,
    ProviderCli, TransactionApprover,
};
use crate::storage::FileDeploymentStore;
use crate::workflow::{
    Collaborators, NavigationRequest, Navigator, SignerProvider, StaticSigner, StepState, WorkflowStep,
};

pub mod accept;
pub mod bids;
pub mod deploy;
pub mod init;
pub mod resume;
pub mod show;

/// Prints navigation requests; the terminal has no router to hand them to
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, request: &NavigationRequest) {
        info!(path = %request.path(), "Navigation requested");
        println!("➡️  {}", request.path());
    }
}

/// Wire the real collaborators from configuration
pub async fn build_collaborators(config: &DeployFlowConfig, auto_approve: bool) -> Result<Collaborators> {
    let cli = ProviderCli::new(Arc::new(ProcessCommandExecutor), config.chain.clone());

    let signer = match keyring_signer(&cli).await {
        Ok(signer) => signer,
        Err(e) => {
            warn!(key = %config.chain.key_name, error = %e, "Could not resolve signer address");
            StaticSigner::anonymous()
        }
    };

    let approver: Arc<dyn TransactionApprover> = if auto_approve {
        Arc::new(AutoApprove)
    } else {
        Arc::new(ConsoleApprover)
    };

    let mut chain = CliChainClient::new(cli.clone(), approver, config.storage.manifests_dir());
    if let Some(address) = signer.address() {
        chain = chain.with_signer(address);
    }

    Ok(Collaborators {
        chain: Arc::new(chain),
        store: Arc::new(FileDeploymentStore::new(config.storage.deployments_dir())),
        signer: Arc::new(signer),
        navigator: Arc::new(ConsoleNavigator),
        preflight: Arc::new(CliPreflight::new(cli, config.preflight.clone())),
    })
}

pub fn print_state(state: &StepState) {
    println!("📍 Step: {}", state.step);
    if let Some(deployment) = &state.deployment {
        println!("   📦 Deployment: {} (owner {})", deployment.dseq, deployment.owner);
    }
    if let Some(intent) = &state.intent_id {
        println!("   🎯 Intent: {intent}");
    }
    if let Some(lease) = &state.lease {
        let price = lease
            .price
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("   🤝 Lease: provider {} at {price} per block", lease.provider);
    }
    if !state.status_message.is_empty() {
        println!("   💬 {}", state.status_message);
    }
}

/// What the user can do from the given step
pub fn next_step_hint(state: &StepState) -> Option<String> {
    match (state.step, &state.deployment) {
        (WorkflowStep::Configuring, _) => Some("deploy-flow deploy <sdl-file>".to_string()),
        (WorkflowStep::PreflightChecking, _) => {
            Some("deploy-flow deploy <sdl-file>  # preflight runs first".to_string())
        }
        (WorkflowStep::ProviderSelecting, Some(deployment)) => Some(format!(
            "deploy-flow bids --dseq {0}  then  deploy-flow accept --dseq {0} --provider <address>",
            deployment.dseq
        )),
        _ => None,
    }
}

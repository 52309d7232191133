use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use deploy_flow::cli::commands::{
    accept::AcceptCommand, bids::BidsCommand, build_collaborators, deploy::DeployCommand,
    init::InitCommand, resume::ResumeCommand, show::ShowCommand,
};
use deploy_flow::cli::{Cli, Commands, LogFormat};
use deploy_flow::{config, init_telemetry, shutdown_telemetry, FileDeploymentStore};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?;

    let json = match cli.log_format {
        Some(format) => format == LogFormat::Json,
        None => config.observability.json,
    };
    init_telemetry(&config.observability.log_level, json)?;

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            None => {
                show_how_to_deploy();
                Ok(())
            }
            Some(Commands::Init { force, dry_run }) => {
                InitCommand::new(force, dry_run).execute().await
            }
            Some(Commands::Deploy {
                sdl,
                name,
                skip_preflight,
            }) => {
                let collaborators = build_collaborators(config, cli.yes).await?;
                DeployCommand::new(sdl, name, skip_preflight, collaborators)
                    .execute()
                    .await
            }
            Some(Commands::Bids { dseq }) => {
                let collaborators = build_collaborators(config, cli.yes).await?;
                BidsCommand::new(dseq, collaborators).execute().await
            }
            Some(Commands::Accept {
                dseq,
                provider,
                gseq,
                oseq,
            }) => {
                let collaborators = build_collaborators(config, cli.yes).await?;
                AcceptCommand::new(dseq, provider, gseq, oseq, collaborators)
                    .execute()
                    .await
            }
            Some(Commands::Resume { intent, dseq }) => {
                let collaborators = build_collaborators(config, cli.yes).await?;
                ResumeCommand::new(intent, dseq, collaborators).execute().await
            }
            Some(Commands::Show { dseq }) => {
                let store = Arc::new(FileDeploymentStore::new(config.storage.deployments_dir()));
                ShowCommand::new(dseq, store).execute().await
            }
        }
    });

    shutdown_telemetry();
    result
}

fn show_how_to_deploy() {
    println!("🚀 deploy-flow - marketplace deployment workflow");
    println!();
    println!("To get started:");
    println!("  ⚙️  deploy-flow init                 # Write deploy-flow.toml");
    println!("  📦 deploy-flow deploy app.yaml       # Preflight and create the deployment");
    println!("  💰 deploy-flow bids --dseq <dseq>     # See provider bids");
    println!("  🤝 deploy-flow accept --dseq <dseq> --provider <address>");
    println!();
    println!("💡 Interrupted? deploy-flow resume --dseq <dseq> shows where to pick up.");
}

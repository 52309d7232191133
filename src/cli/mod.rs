use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "deploy-flow")]
#[command(about = "Deploy a workload to the compute marketplace: deployment, bid, lease, manifest")]
#[command(long_about = "deploy-flow walks a workload specification (SDL) through the marketplace \
                       workflow: create the deployment, pick a provider bid, create the lease and \
                       send the manifest. Interrupted workflows resume from the deployment sequence number.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log output format
    #[arg(long, global = true, value_enum, help = "Log format (defaults to the configured one)")]
    pub log_format: Option<LogFormat>,

    /// Approve every transaction without prompting
    #[arg(short = 'y', long, global = true, help = "Skip signing prompts and approve all transactions")]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default deploy-flow.toml and create the state directory
    Init {
        /// Overwrite an existing configuration file
        #[arg(long, help = "Overwrite an existing deploy-flow.toml")]
        force: bool,
        /// Show what would be created without making changes
        #[arg(long, help = "Show what would be created without making changes")]
        dry_run: bool,
    },
    /// Run preflight and create a deployment from an SDL file
    Deploy {
        /// Path to the SDL file
        sdl: PathBuf,
        /// Display name stored with the deployment
        #[arg(long, help = "Deployment name (defaults to the SDL file name)")]
        name: Option<String>,
        /// Create the deployment even when preflight reports issues
        #[arg(long, help = "Do not stop on preflight issues")]
        skip_preflight: bool,
    },
    /// List open bids for a deployment
    Bids {
        /// Deployment sequence number
        #[arg(long)]
        dseq: String,
    },
    /// Accept a bid: create the lease and send the manifest
    Accept {
        /// Deployment sequence number
        #[arg(long)]
        dseq: String,
        /// Provider address of the chosen bid
        #[arg(long)]
        provider: String,
        /// Group sequence of the bid
        #[arg(long, default_value = "1")]
        gseq: u32,
        /// Order sequence of the bid
        #[arg(long, default_value = "1")]
        oseq: u32,
    },
    /// Show where a workflow would resume from the given identifiers
    Resume {
        /// Intent identifier of a pending preflight check
        #[arg(long)]
        intent: Option<String>,
        /// Deployment sequence number
        #[arg(long)]
        dseq: Option<String>,
    },
    /// Print the saved record for a deployment
    Show {
        /// Deployment sequence number
        #[arg(long)]
        dseq: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_accept_defaults_group_to_one() {
        let cli = Cli::parse_from([
            "deploy-flow",
            "accept",
            "--dseq",
            "42",
            "--provider",
            "akash1provider",
        ]);
        match cli.command {
            Some(Commands::Accept { gseq, oseq, .. }) => {
                assert_eq!((gseq, oseq), (1, 1));
            }
            _ => panic!("expected accept command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["deploy-flow", "bids", "--dseq", "7", "--log-format", "pretty", "-y"]);
        assert_eq!(cli.log_format, Some(LogFormat::Pretty));
        assert!(cli.yes);
    }
}

//! External tool abstractions
//!
//! The chain is only reachable through the provider CLI. Process spawning sits
//! behind [`CommandExecutor`] so the client logic can be tested with scripted
//! output.

pub mod command;
pub mod provider_cli;

pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use provider_cli::{
    keyring_signer, AutoApprove, CliChainClient, CliPreflight, ConsoleApprover, ProviderCli,
    TransactionApprover,
};

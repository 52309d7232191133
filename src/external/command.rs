//! Base command execution abstraction
//!
//! The chain is reached through the provider CLI; everything that spawns a
//! process goes through [`CommandExecutor`] so tests can script the output.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    /// Stderr when present, stdout otherwise
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Trait for executing external commands
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError>;
}

/// Real implementation on top of tokio's process support
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        debug!(program, args = ?args, "Spawning command");

        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CommandError::CommandNotFound {
                        command: program.to_string(),
                    }
                } else {
                    CommandError::Io {
                        message: e.to_string(),
                    }
                }
            })?;

        let status_code = output.status.code().ok_or(CommandError::ExecutionFailed {
            message: format!("{program} was terminated by a signal"),
        })?;

        Ok(CommandOutput {
            status_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::config::{DeployFlowConfig, CONFIG_FILE};

/// Writes the default configuration without touching anything else.
///
/// An existing `deploy-flow.toml` is only replaced with `--force`.
pub struct InitCommand {
    pub force: bool,
    pub dry_run: bool,
    dir: PathBuf,
}

impl InitCommand {
    pub fn new(force: bool, dry_run: bool) -> Self {
        Self {
            force,
            dry_run,
            dir: PathBuf::from("."),
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub async fn execute(&self) -> Result<()> {
        if self.dry_run {
            println!("🚀 DEPLOY-FLOW INIT (DRY RUN)");
        } else {
            println!("🚀 DEPLOY-FLOW INIT");
        }
        println!("==================");
        println!();

        let config_path = self.dir.join(CONFIG_FILE);
        if config_path.exists() && !self.force {
            return Err(anyhow!(
                "{} already exists; use --force to overwrite it",
                config_path.display()
            ));
        }

        let config = DeployFlowConfig::default();
        let state_dir = self.dir.join(&config.storage.state_dir);

        if self.dry_run {
            println!("Would write: {}", config_path.display());
            println!("Would create: {}", state_dir.join("deployments").display());
            println!("Would create: {}", state_dir.join("sdl").display());
            return Ok(());
        }

        config.save_to_file(&config_path)?;
        println!("✅ Wrote {}", config_path.display());

        tokio::fs::create_dir_all(state_dir.join("deployments")).await?;
        tokio::fs::create_dir_all(state_dir.join("sdl")).await?;
        println!("✅ Created {}", state_dir.display());
        println!();
        println!("💡 Set chain.key_name to your keyring entry, then run: deploy-flow deploy <sdl-file>");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();

        InitCommand::new(false, false)
            .with_dir(dir.path())
            .execute()
            .await
            .unwrap();

        assert!(dir.path().join(".deploy-flow/deployments").is_dir());
        let loaded = DeployFlowConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.chain, DeployFlowConfig::default().chain);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[chain]\nkey_name = \"mine\"\n").unwrap();

        let result = InitCommand::new(false, false)
            .with_dir(dir.path())
            .execute()
            .await;
        assert!(result.is_err());

        InitCommand::new(true, false)
            .with_dir(dir.path())
            .execute()
            .await
            .unwrap();
        let loaded = DeployFlowConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.chain.key_name, "default");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();

        InitCommand::new(false, true)
            .with_dir(dir.path())
            .execute()
            .await
            .unwrap();

        assert!(!dir.path().join(CONFIG_FILE).exists());
    }
}

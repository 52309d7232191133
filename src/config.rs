use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "deploy-flow.toml";
const RC_FILE: &str = ".deploy-flow-rc";
const ENV_PREFIX: &str = "DEPLOY_FLOW";

/// Main configuration structure for deploy-flow
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeployFlowConfig {
    /// Chain access through the provider CLI
    pub chain: ChainConfig,
    /// Where deployment records and staged manifests live
    pub storage: StorageConfig,
    /// Readiness thresholds checked before deploying
    pub preflight: PreflightConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChainConfig {
    /// Provider CLI binary
    pub binary: String,
    /// RPC node
    pub node: String,
    pub chain_id: String,
    /// Keyring entry used to sign transactions
    pub key_name: String,
    pub keyring_backend: String,
    pub gas: String,
    pub gas_adjustment: f64,
    pub gas_prices: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
}

impl StorageConfig {
    pub fn deployments_dir(&self) -> PathBuf {
        self.state_dir.join("deployments")
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.state_dir.join("sdl")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreflightConfig {
    /// Minimum spendable balance, in base units of `denom`
    pub min_balance: u64,
    pub denom: String,
    /// Manifests are rejected by providers without a valid client certificate
    pub require_certificate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, overridden by RUST_LOG
    pub log_level: String,
    /// JSON log lines instead of the human formatter
    pub json: bool,
}

impl Default for DeployFlowConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                binary: "provider-services".to_string(),
                node: "https://rpc.akashnet.net:443".to_string(),
                chain_id: "akashnet-2".to_string(),
                key_name: "default".to_string(),
                keyring_backend: "os".to_string(),
                gas: "auto".to_string(),
                gas_adjustment: 1.5,
                gas_prices: "0.025uakt".to_string(),
            },
            storage: StorageConfig {
                state_dir: PathBuf::from(".deploy-flow"),
            },
            preflight: PreflightConfig {
                // Deployment deposit is 0.5 AKT
                min_balance: 500_000,
                denom: "uakt".to_string(),
                require_certificate: true,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: true,
            },
        }
    }
}

impl DeployFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (deploy-flow.toml, .deploy-flow-rc)
    /// 3. Environment variables (prefixed with DEPLOY_FLOW_, `__` between sections)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with config files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let config_file = dir.join(CONFIG_FILE);
        if config_file.exists() {
            builder = builder.add_source(File::from(config_file));
        }

        let rc_file = dir.join(RC_FILE);
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<DeployFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = DeployFlowConfig::load_env_file();
        DeployFlowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static DeployFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let config = config()?;
    tracing::debug!(
        node = %config.chain.node,
        state_dir = ?config.storage.state_dir,
        "Configuration loaded"
    );
    Ok(())
}

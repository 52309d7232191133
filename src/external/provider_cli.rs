//! Chain access through the `provider-services` CLI
//!
//! Transactions are broadcast with JSON output. The CLI's exit status and the
//! transaction `code` are what classify a failure: a JSON response with a
//! non-zero code is a chain rejection, anything else that fails is transport.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use super::command::{CommandError, CommandExecutor, CommandOutput};
use crate::config::{ChainConfig, PreflightConfig};
use crate::workflow::errors::ClientError;
use crate::workflow::traits::{ChainClient, PreflightCheck, StaticSigner};
use crate::workflow::types::*;

const ADDRESS_PATTERN: &str = r"^akash1[02-9ac-hj-np-z]{38}$";
const TX_CONFIRM_ATTEMPTS: u32 = 10;
const TX_CONFIRM_INTERVAL: Duration = Duration::from_secs(1);

/// Asks the user to sign off on a transaction before it is broadcast
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait TransactionApprover: Send + Sync {
    async fn approve(&self, summary: &str) -> bool;
}

/// Approves everything; used with `--yes`
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl TransactionApprover for AutoApprove {
    async fn approve(&self, summary: &str) -> bool {
        debug!(summary, "Transaction auto-approved");
        true
    }
}

/// Prompts on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleApprover;

#[async_trait]
impl TransactionApprover for ConsoleApprover {
    async fn approve(&self, summary: &str) -> bool {
        let prompt = format!("{summary}. Sign and broadcast? [y/N]: ");
        tokio::task::spawn_blocking(move || {
            print!("{prompt}");
            if std::io::stdout().flush().is_err() {
                return false;
            }
            let mut input = String::new();
            if std::io::stdin().read_line(&mut input).is_err() {
                return false;
            }
            matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
        })
        .await
        .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    txhash: String,
    #[serde(default)]
    logs: Vec<TxLog>,
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct TxLog {
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct TxEvent {
    #[serde(default)]
    attributes: Vec<TxAttribute>,
}

#[derive(Debug, Deserialize)]
struct TxAttribute {
    key: String,
    #[serde(default)]
    value: String,
}

impl TxResponse {
    fn all_events(&self) -> impl Iterator<Item = &TxEvent> {
        self.logs
            .iter()
            .flat_map(|log| log.events.iter())
            .chain(self.events.iter())
    }

    /// First value of `key` on any event, with JSON quoting stripped
    fn attribute(&self, key: &str) -> Option<String> {
        self.all_events()
            .flat_map(|event| event.attributes.iter())
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }

    fn has_events(&self) -> bool {
        self.all_events().next().is_some()
    }
}

/// Ids come back as numbers or strings depending on the CLI version
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn as_text(&self) -> String {
        match self {
            NumberOrString::Number(n) => n.to_string(),
            NumberOrString::String(s) => s.clone(),
        }
    }

    fn as_u32(&self) -> Option<u32> {
        self.as_text().parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct MarketId {
    owner: String,
    dseq: NumberOrString,
    gseq: NumberOrString,
    oseq: NumberOrString,
    provider: String,
}

impl MarketId {
    fn to_selection(&self) -> Option<BidSelection> {
        Some(BidSelection {
            owner: self.owner.clone(),
            dseq: Dseq::new(self.dseq.as_text()).ok()?,
            gseq: self.gseq.as_u32()?,
            oseq: self.oseq.as_u32()?,
            provider: self.provider.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LeaseList {
    #[serde(default)]
    leases: Vec<LeaseEntry>,
}

#[derive(Debug, Deserialize)]
struct LeaseEntry {
    lease: LeaseBody,
}

#[derive(Debug, Deserialize)]
struct LeaseBody {
    lease_id: MarketId,
    #[serde(default)]
    price: Option<DecCoin>,
}

#[derive(Debug, Deserialize)]
struct BidList {
    #[serde(default)]
    bids: Vec<BidEntry>,
}

#[derive(Debug, Deserialize)]
struct BidEntry {
    bid: BidBody,
}

#[derive(Debug, Deserialize)]
struct BidBody {
    bid_id: MarketId,
    #[serde(default)]
    state: String,
    price: DecCoin,
}

#[derive(Debug, Deserialize)]
struct ManifestStatus {
    #[serde(default)]
    provider: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct BalanceList {
    #[serde(default)]
    balances: Vec<DecCoin>,
}

#[derive(Debug, Deserialize)]
struct CertificateList {
    #[serde(default)]
    certificates: Vec<serde_json::Value>,
}

/// Thin wrapper that runs provider CLI commands with the configured flags
#[derive(Clone)]
pub struct ProviderCli {
    executor: Arc<dyn CommandExecutor>,
    chain: ChainConfig,
}

impl ProviderCli {
    pub fn new(executor: Arc<dyn CommandExecutor>, chain: ChainConfig) -> Self {
        Self { executor, chain }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.chain
    }

    fn query_flags(&self) -> Vec<String> {
        vec![
            "--node".to_string(),
            self.chain.node.clone(),
            "-o".to_string(),
            "json".to_string(),
        ]
    }

    fn tx_flags(&self) -> Vec<String> {
        let mut flags = vec![
            "--from".to_string(),
            self.chain.key_name.clone(),
            "--chain-id".to_string(),
            self.chain.chain_id.clone(),
            "--keyring-backend".to_string(),
            self.chain.keyring_backend.clone(),
            "--gas".to_string(),
            self.chain.gas.clone(),
            "--gas-adjustment".to_string(),
            self.chain.gas_adjustment.to_string(),
            "--gas-prices".to_string(),
            self.chain.gas_prices.clone(),
            "-y".to_string(),
        ];
        flags.extend(self.query_flags());
        flags
    }

    async fn run(&self, operation: &str, args: Vec<String>) -> Result<CommandOutput, ClientError> {
        debug!(operation, binary = %self.chain.binary, "Running provider CLI");
        self.executor
            .execute(&self.chain.binary, &args)
            .await
            .map_err(|e| transport(operation, e))
    }

    /// Run a read-only query and decode its JSON output
    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        mut args: Vec<String>,
    ) -> Result<T, ClientError> {
        args.extend(self.query_flags());
        let output = self.run(operation, args).await?;
        if !output.success() {
            return Err(ClientError::Transport {
                operation: operation.to_string(),
                message: output.diagnostics().to_string(),
            });
        }
        decode(operation, &output.stdout)
    }

    /// Broadcast a transaction and wait until its events are available
    async fn broadcast(&self, operation: &str, mut args: Vec<String>) -> Result<TxResponse, ClientError> {
        args.extend(self.tx_flags());
        let output = self.run(operation, args).await?;

        let response = match serde_json::from_str::<TxResponse>(&output.stdout) {
            Ok(response) => response,
            Err(_) if !output.success() => {
                return Err(ClientError::Transport {
                    operation: operation.to_string(),
                    message: output.diagnostics().to_string(),
                })
            }
            Err(e) => {
                return Err(ClientError::Malformed {
                    operation: operation.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let response = if response.code == 0 && !response.has_events() && !response.txhash.is_empty() {
            self.wait_for_tx(operation, &response.txhash).await?
        } else {
            response
        };

        if response.code != 0 {
            warn!(operation, code = response.code, txhash = %response.txhash, "Transaction rejected");
            return Err(ClientError::Query {
                operation: operation.to_string(),
                code: Some(response.code),
                log: response.raw_log,
            });
        }
        info!(operation, txhash = %response.txhash, "Transaction committed");
        Ok(response)
    }

    /// Poll for a committed transaction after a sync broadcast
    async fn wait_for_tx(&self, operation: &str, txhash: &str) -> Result<TxResponse, ClientError> {
        for attempt in 1..=TX_CONFIRM_ATTEMPTS {
            tokio::time::sleep(TX_CONFIRM_INTERVAL).await;
            let mut args = vec![
                "query".to_string(),
                "tx".to_string(),
                txhash.to_string(),
            ];
            args.extend(self.query_flags());
            let output = self.run(operation, args).await?;
            if output.success() {
                return decode(operation, &output.stdout);
            }
            debug!(operation, txhash, attempt, "Transaction not yet committed");
        }
        Err(ClientError::Transport {
            operation: operation.to_string(),
            message: format!("transaction {txhash} was not committed in time"),
        })
    }
}

fn transport(operation: &str, error: CommandError) -> ClientError {
    ClientError::Transport {
        operation: operation.to_string(),
        message: error.to_string(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(operation: &str, stdout: &str) -> Result<T, ClientError> {
    serde_json::from_str(stdout).map_err(|e| ClientError::Malformed {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

/// [`ChainClient`] backed by the provider CLI
pub struct CliChainClient {
    cli: ProviderCli,
    approver: Arc<dyn TransactionApprover>,
    manifests_dir: PathBuf,
    signer: Option<String>,
}

impl CliChainClient {
    pub fn new(
        cli: ProviderCli,
        approver: Arc<dyn TransactionApprover>,
        manifests_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cli,
            approver,
            manifests_dir: manifests_dir.into(),
            signer: None,
        }
    }

    /// Owner used when the deployment event does not carry one
    pub fn with_signer(mut self, address: impl Into<String>) -> Self {
        self.signer = Some(address.into());
        self
    }

    async fn require_approval(&self, operation: &str, summary: String) -> Result<(), ClientError> {
        if self.approver.approve(&summary).await {
            Ok(())
        } else {
            info!(operation, "Transaction declined");
            Err(ClientError::Declined {
                operation: operation.to_string(),
            })
        }
    }

    /// Write the SDL where the CLI can read it
    async fn stage_manifest(&self, operation: &str, spec: &WorkloadSpecification) -> Result<PathBuf, ClientError> {
        let path = self.manifests_dir.join(format!("{}.yaml", Uuid::new_v4()));
        let staged = async {
            tokio::fs::create_dir_all(&self.manifests_dir).await?;
            tokio::fs::write(&path, spec.sdl.as_bytes()).await
        };
        staged.await.map_err(|e| ClientError::Transport {
            operation: operation.to_string(),
            message: format!("could not stage manifest: {e}"),
        })?;
        Ok(path)
    }

    async fn discard_manifest(path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(path = ?path, error = %e, "Staged manifest already gone");
        }
    }

    async fn find_lease(&self, bid: &BidSelection) -> Result<Option<LeaseRecord>, ClientError> {
        let list: LeaseList = self
            .cli
            .query(
                "create-lease",
                vec![
                    "query".to_string(),
                    "market".to_string(),
                    "lease".to_string(),
                    "list".to_string(),
                    "--owner".to_string(),
                    bid.owner.clone(),
                    "--dseq".to_string(),
                    bid.dseq.to_string(),
                    "--gseq".to_string(),
                    bid.gseq.to_string(),
                    "--oseq".to_string(),
                    bid.oseq.to_string(),
                    "--provider".to_string(),
                    bid.provider.clone(),
                    "--state".to_string(),
                    "active".to_string(),
                ],
            )
            .await?;

        Ok(list.leases.into_iter().find_map(|entry| {
            let id = entry.lease.lease_id.to_selection()?;
            Some(LeaseRecord {
                deployment: DeploymentIdentity::new(id.owner, id.dseq),
                provider: id.provider,
                gseq: id.gseq,
                oseq: id.oseq,
                price: entry.lease.price,
            })
        }))
    }
}

#[async_trait]
impl ChainClient for CliChainClient {
    async fn create_deployment(
        &self,
        spec: &WorkloadSpecification,
    ) -> Result<Option<DeploymentIdentity>, ClientError> {
        const OPERATION: &str = "create-deployment";
        self.require_approval(OPERATION, format!("Create deployment {:?}", spec.app_name))
            .await?;

        let path = self.stage_manifest(OPERATION, spec).await?;
        let result = self
            .cli
            .broadcast(
                OPERATION,
                vec![
                    "tx".to_string(),
                    "deployment".to_string(),
                    "create".to_string(),
                    path.to_string_lossy().to_string(),
                ],
            )
            .await;
        Self::discard_manifest(&path).await;
        let response = result?;

        let dseq = match response.attribute("dseq").map(Dseq::new) {
            Some(Ok(dseq)) => dseq,
            Some(Err(e)) => {
                return Err(ClientError::Malformed {
                    operation: OPERATION.to_string(),
                    message: e.to_string(),
                })
            }
            None => {
                warn!(txhash = %response.txhash, "Deployment transaction carried no dseq");
                return Ok(None);
            }
        };
        let owner = response.attribute("owner").or_else(|| self.signer.clone());

        Ok(owner.map(|owner| DeploymentIdentity::new(owner, dseq)))
    }

    async fn create_lease(&self, bid: &BidSelection) -> Result<Option<LeaseRecord>, ClientError> {
        const OPERATION: &str = "create-lease";
        self.require_approval(
            OPERATION,
            format!("Create lease for deployment {} with provider {}", bid.dseq, bid.provider),
        )
        .await?;

        self.cli
            .broadcast(
                OPERATION,
                vec![
                    "tx".to_string(),
                    "market".to_string(),
                    "lease".to_string(),
                    "create".to_string(),
                    "--owner".to_string(),
                    bid.owner.clone(),
                    "--dseq".to_string(),
                    bid.dseq.to_string(),
                    "--gseq".to_string(),
                    bid.gseq.to_string(),
                    "--oseq".to_string(),
                    bid.oseq.to_string(),
                    "--provider".to_string(),
                    bid.provider.clone(),
                ],
            )
            .await?;

        self.find_lease(bid).await
    }

    async fn send_manifest(&self, submission: &ManifestSubmission) -> Result<(), ClientError> {
        const OPERATION: &str = "send-manifest";
        let lease = &submission.lease;
        let path = self.stage_manifest(OPERATION, &submission.spec).await?;

        let config = self.cli.config();
        let mut args = vec![
            "send-manifest".to_string(),
            path.to_string_lossy().to_string(),
            "--dseq".to_string(),
            lease.deployment.dseq.to_string(),
            "--gseq".to_string(),
            lease.gseq.to_string(),
            "--oseq".to_string(),
            lease.oseq.to_string(),
            "--provider".to_string(),
            lease.provider.clone(),
            "--from".to_string(),
            config.key_name.clone(),
            "--keyring-backend".to_string(),
            config.keyring_backend.clone(),
        ];
        args.extend(self.cli.query_flags());

        let result = self.cli.run(OPERATION, args).await;
        Self::discard_manifest(&path).await;
        let output = result?;

        if !output.success() {
            return Err(ClientError::Transport {
                operation: OPERATION.to_string(),
                message: output.diagnostics().to_string(),
            });
        }

        let statuses: Vec<ManifestStatus> = decode(OPERATION, &output.stdout)?;
        if let Some(failed) = statuses.iter().find(|s| !s.status.eq_ignore_ascii_case("PASS")) {
            return Err(ClientError::Query {
                operation: OPERATION.to_string(),
                code: None,
                log: format!("{}: {} {}", failed.provider, failed.status, failed.error)
                    .trim()
                    .to_string(),
            });
        }

        info!(provider = %lease.provider, dseq = %lease.deployment.dseq, "Manifest accepted");
        Ok(())
    }

    async fn list_bids(&self, deployment: &DeploymentIdentity) -> Result<Vec<Bid>, ClientError> {
        let list: BidList = self
            .cli
            .query(
                "list-bids",
                vec![
                    "query".to_string(),
                    "market".to_string(),
                    "bid".to_string(),
                    "list".to_string(),
                    "--owner".to_string(),
                    deployment.owner.clone(),
                    "--dseq".to_string(),
                    deployment.dseq.to_string(),
                    "--state".to_string(),
                    "open".to_string(),
                ],
            )
            .await?;

        Ok(list
            .bids
            .into_iter()
            .filter_map(|entry| {
                Some(Bid {
                    id: entry.bid.bid_id.to_selection()?,
                    price: entry.bid.price,
                    state: entry.bid.state,
                })
            })
            .collect())
    }
}

/// Resolve the configured keyring entry to its account address
pub async fn keyring_signer(cli: &ProviderCli) -> Result<StaticSigner, ClientError> {
    const OPERATION: &str = "resolve-signer";
    let config = cli.config();
    let output = cli
        .run(
            OPERATION,
            vec![
                "keys".to_string(),
                "show".to_string(),
                config.key_name.clone(),
                "-a".to_string(),
                "--keyring-backend".to_string(),
                config.keyring_backend.clone(),
            ],
        )
        .await?;

    if !output.success() {
        return Err(ClientError::Transport {
            operation: OPERATION.to_string(),
            message: output.diagnostics().to_string(),
        });
    }

    let address = output.stdout.trim();
    let pattern = Regex::new(ADDRESS_PATTERN).map_err(|e| ClientError::Malformed {
        operation: OPERATION.to_string(),
        message: e.to_string(),
    })?;
    if !pattern.is_match(address) {
        return Err(ClientError::Malformed {
            operation: OPERATION.to_string(),
            message: format!("{address:?} is not an account address"),
        });
    }
    debug!(address, key = %config.key_name, "Resolved signer");
    Ok(StaticSigner::new(address))
}

/// Preflight gate querying balance and certificates through the CLI
pub struct CliPreflight {
    cli: ProviderCli,
    settings: PreflightConfig,
}

impl CliPreflight {
    pub fn new(cli: ProviderCli, settings: PreflightConfig) -> Self {
        Self { cli, settings }
    }
}

#[async_trait]
impl PreflightCheck for CliPreflight {
    async fn check(&self, signer: Option<String>) -> Result<PreflightReport, ClientError> {
        const OPERATION: &str = "preflight";
        let Some(address) = signer else {
            return Ok(PreflightReport {
                issues: vec![PreflightIssue::SignerMissing],
            });
        };

        let mut issues = Vec::new();

        let balances: BalanceList = self
            .cli
            .query(
                OPERATION,
                vec![
                    "query".to_string(),
                    "bank".to_string(),
                    "balances".to_string(),
                    address.clone(),
                ],
            )
            .await?;
        let available = balances
            .balances
            .iter()
            .filter(|coin| coin.denom == self.settings.denom)
            .filter_map(|coin| coin.amount.parse::<u128>().ok())
            .sum::<u128>();
        let required = u128::from(self.settings.min_balance);
        if available < required {
            issues.push(PreflightIssue::InsufficientBalance {
                required,
                available,
                denom: self.settings.denom.clone(),
            });
        }

        if self.settings.require_certificate {
            let certificates: CertificateList = self
                .cli
                .query(
                    OPERATION,
                    vec![
                        "query".to_string(),
                        "cert".to_string(),
                        "list".to_string(),
                        "--owner".to_string(),
                        address.clone(),
                        "--state".to_string(),
                        "valid".to_string(),
                    ],
                )
                .await?;
            if certificates.certificates.is_empty() {
                issues.push(PreflightIssue::CertificateMissing);
            }
        }

        debug!(address = %address, issues = issues.len(), "Preflight evaluated");
        Ok(PreflightReport { issues })
    }
}

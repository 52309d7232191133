// Core types for the deployment workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Intent identifier used when the configuration step hands over to the preflight gate
pub const PREFLIGHT_INTENT: &str = "preflight-check";

/// Status messages shown while the workflow runs
pub mod status {
    pub const CREATING_DEPLOYMENT: &str = "Creating deployment";
    pub const DEPLOYMENT_FAILED: &str = "Could not create deployment.";
    pub const CREATING_LEASE: &str = "Creating lease";
    pub const SENDING_MANIFEST: &str = "Sending manifest";
    pub const LEASE_FAILED: &str = "Could not create lease.";
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid deployment sequence number: {0:?}")]
pub struct InvalidDseq(pub String);

/// Deployment sequence number assigned by the chain when a deployment is created.
///
/// Kept as a decimal string since that is how the chain and route parameters carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dseq(String);

impl Dseq {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidDseq> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidDseq(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dseq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Dseq {
    type Err = InvalidDseq;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dseq::new(s)
    }
}

impl TryFrom<String> for Dseq {
    type Error = InvalidDseq;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Dseq::new(value)
    }
}

impl From<Dseq> for String {
    fn from(dseq: Dseq) -> Self {
        dseq.0
    }
}

/// User-authored workload specification (SDL) plus its display name.
/// The SDL body is opaque to the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpecification {
    pub app_name: String,
    pub sdl: String,
}

impl WorkloadSpecification {
    pub fn new(app_name: impl Into<String>, sdl: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            sdl: sdl.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sdl.trim().is_empty()
    }
}

/// Owner address plus sequence number; identifies one workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    pub owner: String,
    pub dseq: Dseq,
}

impl DeploymentIdentity {
    pub fn new(owner: impl Into<String>, dseq: Dseq) -> Self {
        Self {
            owner: owner.into(),
            dseq,
        }
    }
}

impl fmt::Display for DeploymentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.dseq)
    }
}

/// A provider bid chosen during provider selection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidSelection {
    pub owner: String,
    pub dseq: Dseq,
    pub gseq: u32,
    pub oseq: u32,
    pub provider: String,
}

impl BidSelection {
    pub fn for_deployment(deployment: &DeploymentIdentity, provider: impl Into<String>) -> Self {
        Self {
            owner: deployment.owner.clone(),
            dseq: deployment.dseq.clone(),
            gseq: 1,
            oseq: 1,
            provider: provider.into(),
        }
    }

    pub fn with_group(mut self, gseq: u32, oseq: u32) -> Self {
        self.gseq = gseq;
        self.oseq = oseq;
        self
    }

    pub fn belongs_to(&self, deployment: &DeploymentIdentity) -> bool {
        self.owner == deployment.owner && self.dseq == deployment.dseq
    }
}

/// Amount with denomination as the chain reports prices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: String,
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Lease formed from an accepted bid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub deployment: DeploymentIdentity,
    pub provider: String,
    pub gseq: u32,
    pub oseq: u32,
    pub price: Option<DecCoin>,
}

impl LeaseRecord {
    /// True when this lease was formed from the given bid
    pub fn matches_bid(&self, bid: &BidSelection) -> bool {
        self.deployment.owner == bid.owner
            && self.deployment.dseq == bid.dseq
            && self.gseq == bid.gseq
            && self.oseq == bid.oseq
            && self.provider == bid.provider
    }
}

/// Everything the provider needs to receive the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSubmission {
    pub signer: String,
    pub lease: LeaseRecord,
    pub spec: WorkloadSpecification,
}

/// Bid listing entry returned by the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidSelection,
    pub price: DecCoin,
    pub state: String,
}

/// Value persisted under a deployment's sequence number so a later session can
/// reconstruct the workload specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDeployment {
    pub name: String,
    pub sdl: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SavedDeployment {
    pub fn new(spec: &WorkloadSpecification, owner: &str) -> Self {
        Self {
            name: spec.app_name.clone(),
            sdl: spec.sdl.clone(),
            owner: Some(owner.to_string()),
            created_at: Some(Utc::now()),
        }
    }

    pub fn specification(&self) -> WorkloadSpecification {
        WorkloadSpecification::new(self.name.clone(), self.sdl.clone())
    }
}

/// Workflow steps in the order they are reached.
///
/// `CreatingLease` and `SendingManifest` are the in-flight phases of provider
/// selection; failures in either return to `ProviderSelecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStep {
    Configuring,
    PreflightChecking,
    ProviderSelecting,
    CreatingLease,
    SendingManifest,
    Completed,
}

impl WorkflowStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStep::Completed)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::Configuring => "configuring",
            WorkflowStep::PreflightChecking => "preflight-checking",
            WorkflowStep::ProviderSelecting => "provider-selection",
            WorkflowStep::CreatingLease => "creating-lease",
            WorkflowStep::SendingManifest => "sending-manifest",
            WorkflowStep::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Observable snapshot of the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub step: WorkflowStep,
    pub status_message: String,
    pub busy: bool,
    pub intent_id: Option<String>,
    pub deployment: Option<DeploymentIdentity>,
    pub lease: Option<LeaseRecord>,
}

impl Default for StepState {
    fn default() -> Self {
        Self {
            step: WorkflowStep::Configuring,
            status_message: String::new(),
            busy: false,
            intent_id: None,
            deployment: None,
            lease: None,
        }
    }
}

/// The three network-bound operations of the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    CreateDeployment,
    CreateLease,
    SendManifest,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::CreateDeployment => "create-deployment",
            MutationKind::CreateLease => "create-lease",
            MutationKind::SendManifest => "send-manifest",
        };
        f.write_str(name)
    }
}

/// Resumption identifiers supplied by the host (route parameters)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RouteParams {
    pub intent_id: Option<String>,
    pub dseq: Option<Dseq>,
}

impl RouteParams {
    /// Build from raw route values; empty strings count as absent
    pub fn from_raw(intent_id: Option<&str>, dseq: Option<&str>) -> Result<Self, InvalidDseq> {
        let intent_id = intent_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let dseq = dseq
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Dseq::new)
            .transpose()?;
        Ok(Self { intent_id, dseq })
    }
}

/// Navigation requests emitted to the routing collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRequest {
    /// Enter the preflight gate, carrying the specification as transient context
    Preflight {
        intent_id: String,
        spec: WorkloadSpecification,
    },
    /// Step-scoped location for an existing deployment
    ConfigureDeployment { dseq: Dseq },
}

impl NavigationRequest {
    pub fn path(&self) -> String {
        match self {
            NavigationRequest::Preflight { intent_id, .. } => {
                format!("/new-deployment/custom-sdl/{intent_id}")
            }
            NavigationRequest::ConfigureDeployment { dseq } => {
                format!("/configure-deployment/{dseq}")
            }
        }
    }
}

/// Issues found by the preflight gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreflightIssue {
    /// No authenticated signer
    SignerMissing,
    /// Account cannot cover the deployment deposit
    InsufficientBalance {
        required: u128,
        available: u128,
        denom: String,
    },
    /// No valid client certificate on chain; manifests cannot be sent without one
    CertificateMissing,
}

impl fmt::Display for PreflightIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreflightIssue::SignerMissing => f.write_str("no signer is connected"),
            PreflightIssue::InsufficientBalance {
                required,
                available,
                denom,
            } => write!(
                f,
                "balance {available}{denom} is below the required {required}{denom}"
            ),
            PreflightIssue::CertificateMissing => f.write_str("no valid certificate found"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub issues: Vec<PreflightIssue>,
}

impl PreflightReport {
    pub fn is_ready(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Audit record of a step change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTransitionRecord {
    pub from: WorkflowStep,
    pub to: WorkflowStep,
    pub trigger: String,
    pub timestamp: DateTime<Utc>,
}

// Hand-written fakes for orchestrator tests - no side effects

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::storage::InMemoryDeploymentStore;
use crate::workflow::errors::ClientError;
use crate::workflow::orchestrator::Collaborators;
use crate::workflow::traits::*;
use crate::workflow::types::*;

/// Calls seen by the fake chain, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    CreateDeployment(WorkloadSpecification),
    CreateLease(BidSelection),
    SendManifest(ManifestSubmission),
    ListBids(DeploymentIdentity),
}

/// Chain client answering from queued responses.
/// An empty queue answers with a default success.
#[derive(Debug, Default)]
pub struct FakeChain {
    deployments: Mutex<VecDeque<Result<Option<DeploymentIdentity>, ClientError>>>,
    leases: Mutex<VecDeque<Result<Option<LeaseRecord>, ClientError>>>,
    manifests: Mutex<VecDeque<Result<(), ClientError>>>,
    bids: Mutex<Vec<Bid>>,
    calls: Mutex<Vec<ChainCall>>,
    stalled: Mutex<HashSet<MutationKind>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_deployment(&self, response: Result<Option<DeploymentIdentity>, ClientError>) {
        self.deployments.lock().unwrap().push_back(response);
    }

    pub fn push_lease(&self, response: Result<Option<LeaseRecord>, ClientError>) {
        self.leases.lock().unwrap().push_back(response);
    }

    pub fn push_manifest(&self, response: Result<(), ClientError>) {
        self.manifests.lock().unwrap().push_back(response);
    }

    pub fn set_bids(&self, bids: Vec<Bid>) {
        *self.bids.lock().unwrap() = bids;
    }

    /// Calls of this kind never complete until released
    pub fn stall(&self, kind: MutationKind) {
        self.stalled.lock().unwrap().insert(kind);
    }

    pub fn release(&self, kind: MutationKind) {
        self.stalled.lock().unwrap().remove(&kind);
    }

    async fn wait_if_stalled(&self, kind: MutationKind) {
        let stalled = self.stalled.lock().unwrap().contains(&kind);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    pub fn calls(&self) -> Vec<ChainCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn manifest_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ChainCall::SendManifest(_)))
            .count()
    }

    fn record(&self, call: ChainCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn create_deployment(
        &self,
        spec: &WorkloadSpecification,
    ) -> Result<Option<DeploymentIdentity>, ClientError> {
        self.record(ChainCall::CreateDeployment(spec.clone()));
        self.wait_if_stalled(MutationKind::CreateDeployment).await;
        self.deployments
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(identity(OWNER, "1000"))))
    }

    async fn create_lease(&self, bid: &BidSelection) -> Result<Option<LeaseRecord>, ClientError> {
        self.record(ChainCall::CreateLease(bid.clone()));
        self.wait_if_stalled(MutationKind::CreateLease).await;
        self.leases
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(lease_for(bid))))
    }

    async fn send_manifest(&self, submission: &ManifestSubmission) -> Result<(), ClientError> {
        self.record(ChainCall::SendManifest(submission.clone()));
        self.wait_if_stalled(MutationKind::SendManifest).await;
        self.manifests.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn list_bids(&self, deployment: &DeploymentIdentity) -> Result<Vec<Bid>, ClientError> {
        self.record(ChainCall::ListBids(deployment.clone()));
        Ok(self.bids.lock().unwrap().clone())
    }
}

/// Navigator that remembers every request
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    requests: Mutex<Vec<NavigationRequest>>,
}

impl RecordingNavigator {
    pub fn requests(&self) -> Vec<NavigationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, request: &NavigationRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

/// Preflight gate with a fixed answer
#[derive(Debug, Default)]
pub struct FixedPreflight {
    pub report: PreflightReport,
}

#[async_trait]
impl PreflightCheck for FixedPreflight {
    async fn check(&self, signer: Option<String>) -> Result<PreflightReport, ClientError> {
        let mut report = self.report.clone();
        if signer.is_none() {
            report.issues.insert(0, PreflightIssue::SignerMissing);
        }
        Ok(report)
    }
}

pub const OWNER: &str = "akash1owner";
pub const PROVIDER: &str = "akash1provider";

pub fn identity(owner: &str, dseq: &str) -> DeploymentIdentity {
    DeploymentIdentity::new(owner, Dseq::new(dseq).unwrap())
}

pub fn lease_for(bid: &BidSelection) -> LeaseRecord {
    LeaseRecord {
        deployment: DeploymentIdentity::new(bid.owner.clone(), bid.dseq.clone()),
        provider: bid.provider.clone(),
        gseq: bid.gseq,
        oseq: bid.oseq,
        price: Some(DecCoin {
            denom: "uakt".to_string(),
            amount: "1.5".to_string(),
        }),
    }
}

pub fn sample_spec() -> WorkloadSpecification {
    WorkloadSpecification::new("hello-world", "version: \"2.0\"\nservices:\n  web: {}\n")
}

/// Fakes plus the collaborator bundle wired from them
pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub store: Arc<InMemoryDeploymentStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub collaborators: Collaborators,
}

impl Harness {
    pub fn new(signer: Option<&str>) -> Self {
        Self::with_preflight(signer, PreflightReport::default())
    }

    pub fn with_preflight(signer: Option<&str>, report: PreflightReport) -> Self {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(InMemoryDeploymentStore::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let signer = match signer {
            Some(address) => StaticSigner::new(address),
            None => StaticSigner::anonymous(),
        };
        let collaborators = Collaborators {
            chain: chain.clone(),
            store: store.clone(),
            signer: Arc::new(signer),
            navigator: navigator.clone(),
            preflight: Arc::new(FixedPreflight { report }),
        };
        Self {
            chain,
            store,
            navigator,
            collaborators,
        }
    }
}

// Shared fakes for integration tests - scripted chain, recording navigator,
// fixed preflight and a busy probe that watches the executors during calls

#![allow(dead_code)]

use async_trait::async_trait;
use deploy_flow::storage::InMemoryDeploymentStore;
use deploy_flow::workflow::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const OWNER: &str = "akash1qy2x5cq7d8t3pghqwsl6xjl4rr7lh4u8h7rp9k";
pub const PROVIDER: &str = "akash1provider";

/// Outcome a scripted call should produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Success,
    Empty,
    Declined,
    Failed,
}

/// What the chain saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    DeploymentCreated(Option<DeploymentIdentity>),
    LeaseCreated {
        bid: BidSelection,
        lease: Option<LeaseRecord>,
    },
    ManifestSent(ManifestSubmission),
    Failed(String),
}

/// Observes the orchestrator's busy flags from inside chain calls
#[derive(Default)]
pub struct BusyProbe {
    flags: Mutex<Vec<BusyFlag>>,
    samples: Mutex<Vec<usize>>,
}

impl BusyProbe {
    pub fn attach(&self, flags: impl IntoIterator<Item = BusyFlag>) {
        *self.flags.lock().unwrap() = flags.into_iter().collect();
    }

    fn sample(&self) {
        let busy = self
            .flags
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.is_busy())
            .count();
        self.samples.lock().unwrap().push(busy);
    }

    /// Number of busy executors seen during each chain call
    pub fn samples(&self) -> Vec<usize> {
        self.samples.lock().unwrap().clone()
    }
}

pub struct ScriptedChain {
    next_dseq: Mutex<u64>,
    deployments: Mutex<VecDeque<Scripted>>,
    leases: Mutex<VecDeque<Scripted>>,
    manifests: Mutex<VecDeque<Scripted>>,
    events: Mutex<Vec<ChainEvent>>,
    pub probe: BusyProbe,
}

impl Default for ScriptedChain {
    fn default() -> Self {
        Self {
            next_dseq: Mutex::new(1000),
            deployments: Mutex::new(VecDeque::new()),
            leases: Mutex::new(VecDeque::new()),
            manifests: Mutex::new(VecDeque::new()),
            events: Mutex::new(Vec::new()),
            probe: BusyProbe::default(),
        }
    }
}

impl ScriptedChain {
    pub fn script_deployment(&self, outcome: Scripted) {
        self.deployments.lock().unwrap().push_back(outcome);
    }

    pub fn script_lease(&self, outcome: Scripted) {
        self.leases.lock().unwrap().push_back(outcome);
    }

    pub fn script_manifest(&self, outcome: Scripted) {
        self.manifests.lock().unwrap().push_back(outcome);
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.events.lock().unwrap().clone()
    }

    fn next(queue: &Mutex<VecDeque<Scripted>>) -> Scripted {
        queue.lock().unwrap().pop_front().unwrap_or(Scripted::Success)
    }

    fn record(&self, event: ChainEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn failure(&self, outcome: &Scripted, operation: &str) -> ClientError {
        self.record(ChainEvent::Failed(operation.to_string()));
        match outcome {
            Scripted::Declined => ClientError::Declined {
                operation: operation.to_string(),
            },
            _ => ClientError::Transport {
                operation: operation.to_string(),
                message: "connection reset".to_string(),
            },
        }
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn create_deployment(
        &self,
        _spec: &WorkloadSpecification,
    ) -> Result<Option<DeploymentIdentity>, ClientError> {
        self.probe.sample();
        tokio::task::yield_now().await;
        let outcome = Self::next(&self.deployments);
        match outcome {
            Scripted::Success => {
                let mut next = self.next_dseq.lock().unwrap();
                *next += 1;
                let identity = DeploymentIdentity::new(OWNER, Dseq::new(next.to_string()).unwrap());
                self.record(ChainEvent::DeploymentCreated(Some(identity.clone())));
                Ok(Some(identity))
            }
            Scripted::Empty => {
                self.record(ChainEvent::DeploymentCreated(None));
                Ok(None)
            }
            other => Err(self.failure(&other, "create-deployment")),
        }
    }

    async fn create_lease(&self, bid: &BidSelection) -> Result<Option<LeaseRecord>, ClientError> {
        self.probe.sample();
        tokio::task::yield_now().await;
        let outcome = Self::next(&self.leases);
        match outcome {
            Scripted::Success => {
                let lease = lease_for(bid);
                self.record(ChainEvent::LeaseCreated {
                    bid: bid.clone(),
                    lease: Some(lease.clone()),
                });
                Ok(Some(lease))
            }
            Scripted::Empty => {
                self.record(ChainEvent::LeaseCreated {
                    bid: bid.clone(),
                    lease: None,
                });
                Ok(None)
            }
            other => Err(self.failure(&other, "create-lease")),
        }
    }

    async fn send_manifest(&self, submission: &ManifestSubmission) -> Result<(), ClientError> {
        self.probe.sample();
        tokio::task::yield_now().await;
        let outcome = Self::next(&self.manifests);
        match outcome {
            Scripted::Success | Scripted::Empty => {
                self.record(ChainEvent::ManifestSent(submission.clone()));
                Ok(())
            }
            other => Err(self.failure(&other, "send-manifest")),
        }
    }

    async fn list_bids(&self, deployment: &DeploymentIdentity) -> Result<Vec<Bid>, ClientError> {
        Ok(vec![Bid {
            id: BidSelection::for_deployment(deployment, PROVIDER),
            price: DecCoin {
                denom: "uakt".to_string(),
                amount: "1.0".to_string(),
            },
            state: "open".to_string(),
        }])
    }
}

#[derive(Default)]
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

pub struct ReadyPreflight;

#[async_trait]
impl PreflightCheck for ReadyPreflight {
    async fn check(&self, signer: Option<String>) -> Result<PreflightReport, ClientError> {
        Ok(PreflightReport {
            issues: match signer {
                Some(_) => Vec::new(),
                None => vec![PreflightIssue::SignerMissing],
            },
        })
    }
}

pub fn lease_for(bid: &BidSelection) -> LeaseRecord {
    LeaseRecord {
        deployment: DeploymentIdentity::new(bid.owner.clone(), bid.dseq.clone()),
        provider: bid.provider.clone(),
        gseq: bid.gseq,
        oseq: bid.oseq,
        price: None,
    }
}

pub fn sample_spec() -> WorkloadSpecification {
    WorkloadSpecification::new(
        "nginx",
        "version: \"2.0\"\nservices:\n  web:\n    image: nginx\n",
    )
}

pub struct TestWorld {
    pub chain: Arc<ScriptedChain>,
    pub store: Arc<InMemoryDeploymentStore>,
    pub navigator: Arc<RecordingNavigator>,
    pub collaborators: Collaborators,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_signer(Some(OWNER))
    }

    pub fn with_signer(signer: Option<&str>) -> Self {
        let chain = Arc::new(ScriptedChain::default());
        let store = Arc::new(InMemoryDeploymentStore::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let signer = signer.map(StaticSigner::new).unwrap_or_else(StaticSigner::anonymous);
        let collaborators = Collaborators {
            chain: chain.clone(),
            store: store.clone(),
            signer: Arc::new(signer),
            navigator: navigator.clone(),
            preflight: Arc::new(ReadyPreflight),
        };
        Self {
            chain,
            store,
            navigator,
            collaborators,
        }
    }

    /// Orchestrator whose busy flags are watched by the chain
    pub fn orchestrator(&self) -> WorkflowOrchestrator {
        let orchestrator = WorkflowOrchestrator::new(self.collaborators.clone());
        self.watch(&orchestrator);
        orchestrator
    }

    pub fn watch(&self, orchestrator: &WorkflowOrchestrator) {
        self.chain
            .probe
            .attach(orchestrator.busy_flags().into_iter().map(|(_, flag)| flag));
    }
}

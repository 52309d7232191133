// Workflow orchestrator - owns the step state and drives the three mutations

use chrono::Utc;
use statig::prelude::*;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::storage::DeploymentStore;
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflow::errors::WorkflowError;
use crate::workflow::executor::{BusyFlag, MutationExecutor};
use crate::workflow::resolver::ResumptionResolver;
use crate::workflow::state_machine::{current_step, WorkflowEvent, WorkflowMachine};
use crate::workflow::traits::*;
use crate::workflow::types::*;

/// Everything the workflow talks to, injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn DeploymentStore>,
    pub signer: Arc<dyn SignerProvider>,
    pub navigator: Arc<dyn Navigator>,
    pub preflight: Arc<dyn PreflightCheck>,
}

/// Single owner of the step state for one deployment workflow.
///
/// Every operation takes `&mut self`, so two mutations can never overlap on
/// one instance. Failed mutations reset the step and come back as errors; the
/// workflow never parks in an error step.
pub struct WorkflowOrchestrator {
    machine: StateMachine<WorkflowMachine>,
    collaborators: Collaborators,
    deployment_executor: MutationExecutor,
    lease_executor: MutationExecutor,
    manifest_executor: MutationExecutor,
    spec: Option<WorkloadSpecification>,
    selected_bid: Option<BidSelection>,
    in_flight: Option<MutationKind>,
    history: Vec<StepTransitionRecord>,
    state_tx: watch::Sender<StepState>,
    correlation_id: String,
}

impl WorkflowOrchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        let (state_tx, _) = watch::channel(StepState::default());
        Self {
            machine: WorkflowMachine::new().state_machine(),
            collaborators,
            deployment_executor: MutationExecutor::new(MutationKind::CreateDeployment),
            lease_executor: MutationExecutor::new(MutationKind::CreateLease),
            manifest_executor: MutationExecutor::new(MutationKind::SendManifest),
            spec: None,
            selected_bid: None,
            in_flight: None,
            history: Vec::new(),
            state_tx,
            correlation_id: generate_correlation_id(),
        }
    }

    /// Build an orchestrator positioned by the given route identifiers
    pub async fn resume(
        collaborators: Collaborators,
        params: &RouteParams,
    ) -> Result<Self, WorkflowError> {
        let mut orchestrator = Self::new(collaborators);
        orchestrator.apply_route(params).await?;
        Ok(orchestrator)
    }

    /// Re-run resumption for new route identifiers.
    ///
    /// When the route points at a different deployment than the one held, the
    /// specification is replaced by the saved record for it, or cleared when
    /// nothing was saved.
    pub async fn apply_route(&mut self, params: &RouteParams) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        if self.step().is_terminal() {
            debug!(correlation_id = %self.correlation_id, "Workflow completed; route change ignored");
            return Ok(());
        }

        let owner = self.collaborators.signer.address();
        let hydrated = ResumptionResolver::resolve_with_store(
            params,
            owner.as_deref(),
            self.collaborators.store.as_ref(),
        )
        .await?;

        let resolution = hydrated.resolution;
        // A spec belongs to one deployment; a different identity only gets
        // what the store saved for it
        if let Some(deployment) = &resolution.deployment {
            if Some(deployment) != self.machine.inner().deployment() {
                self.selected_bid = None;
                self.spec = hydrated.saved.map(|saved| saved.specification());
            }
        } else if self.machine.inner().deployment().is_some() {
            self.selected_bid = None;
            self.spec = None;
        }

        info!(
            step = %resolution.step,
            intent_id = ?resolution.intent_id,
            dseq = ?resolution.deployment.as_ref().map(|d| d.dseq.as_str()),
            "Resuming workflow"
        );
        self.dispatch(WorkflowEvent::Resume(resolution));
        Ok(())
    }

    /// Replace the editable specification. Refused once a deployment exists.
    pub fn set_specification(&mut self, spec: WorkloadSpecification) -> Result<(), WorkflowError> {
        self.settle_abandoned();
        if let Some(deployment) = self.machine.inner().deployment() {
            return Err(WorkflowError::SpecificationFrozen {
                dseq: deployment.dseq.clone(),
            });
        }
        self.spec = Some(spec);
        Ok(())
    }

    /// Hand the specification over to the preflight gate
    pub fn begin_preflight(&mut self, spec: WorkloadSpecification) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.expect_step("begin preflight", &[WorkflowStep::Configuring])?;
        if spec.is_empty() {
            return Err(WorkflowError::PreconditionMissing {
                action: "begin preflight",
                missing: "workload specification",
            });
        }

        self.spec = Some(spec.clone());
        self.dispatch(WorkflowEvent::PreflightRequested {
            intent_id: PREFLIGHT_INTENT.to_string(),
        });
        self.collaborators
            .navigator
            .navigate(&NavigationRequest::Preflight {
                intent_id: PREFLIGHT_INTENT.to_string(),
                spec,
            });
        Ok(())
    }

    /// Ask the preflight collaborator whether the signer is ready.
    ///
    /// A ready report only advances the workflow when a deployment is already
    /// known; otherwise the workflow stays in preflight.
    pub async fn run_preflight(&mut self) -> Result<PreflightReport, WorkflowError> {
        self.ensure_idle()?;
        self.expect_step("run preflight", &[WorkflowStep::PreflightChecking])?;

        let signer = self.collaborators.signer.address();
        let span = create_workflow_span("preflight", None, Some(&self.correlation_id));
        let report = self
            .collaborators
            .preflight
            .check(signer)
            .instrument(span)
            .await
            .map_err(WorkflowError::Preflight)?;

        if report.is_ready() {
            let deployment = self.machine.inner().deployment().cloned();
            self.dispatch(WorkflowEvent::PreflightPassed { deployment });
        } else {
            for issue in &report.issues {
                warn!(issue = %issue, "Preflight issue");
            }
        }
        Ok(report)
    }

    /// Apply an external readiness signal, optionally carrying a dseq
    pub async fn preflight_ready(&mut self, dseq: Option<Dseq>) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.expect_step("complete preflight", &[WorkflowStep::PreflightChecking])?;

        let deployment = match dseq {
            Some(dseq) => {
                let owner = self.require_signer("complete preflight")?;
                if self.spec.is_none() {
                    if let Some(saved) = self.collaborators.store.get(&dseq).await? {
                        self.spec = Some(saved.specification());
                    }
                }
                Some(DeploymentIdentity::new(owner, dseq))
            }
            None => None,
        };
        self.dispatch(WorkflowEvent::PreflightPassed { deployment });
        Ok(())
    }

    /// Create the deployment on chain.
    ///
    /// On success the record is saved before the step changes and before
    /// navigation. A save failure is returned, but the workflow still moves on
    /// since the deployment exists on chain.
    pub async fn create_deployment(
        &mut self,
        spec: WorkloadSpecification,
    ) -> Result<DeploymentIdentity, WorkflowError> {
        self.ensure_idle()?;
        self.expect_step(
            "create deployment",
            &[WorkflowStep::Configuring, WorkflowStep::PreflightChecking],
        )?;
        if spec.is_empty() {
            return Err(WorkflowError::PreconditionMissing {
                action: "create deployment",
                missing: "workload specification",
            });
        }
        let owner = self.require_signer("create deployment")?;

        self.spec = Some(spec.clone());
        self.dispatch(WorkflowEvent::DeploymentRequested);

        let chain = Arc::clone(&self.collaborators.chain);
        let span = create_workflow_span("create-deployment", None, Some(&self.correlation_id));
        self.begin_mutation(MutationKind::CreateDeployment);
        let result = self
            .deployment_executor
            .execute(chain.create_deployment(&spec))
            .instrument(span)
            .await;
        self.in_flight = None;

        let identity = match result {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                warn!(app = %spec.app_name, "Deployment call returned no identity");
                self.dispatch(WorkflowEvent::DeploymentEmpty);
                return Err(WorkflowError::EmptyResult {
                    operation: MutationKind::CreateDeployment,
                });
            }
            Err(e) => {
                self.dispatch(WorkflowEvent::DeploymentFailed);
                return Err(WorkflowError::from_client(MutationKind::CreateDeployment, e));
            }
        };

        if identity.owner != owner {
            warn!(signer = %owner, owner = %identity.owner, "Deployment owner differs from signer");
        }

        let record = SavedDeployment::new(&spec, &identity.owner);
        let persisted = self.collaborators.store.put(&identity.dseq, &record).await;
        if let Err(e) = &persisted {
            warn!(dseq = %identity.dseq, error = %e, "Failed to save deployment record");
        }

        self.dispatch(WorkflowEvent::DeploymentCreated {
            deployment: identity.clone(),
        });
        self.collaborators
            .navigator
            .navigate(&NavigationRequest::ConfigureDeployment {
                dseq: identity.dseq.clone(),
            });

        persisted?;
        Ok(identity)
    }

    /// Remember the bid the user picked; nothing is sent yet
    pub fn select_bid(&mut self, bid: BidSelection) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.expect_step("select bid", &[WorkflowStep::ProviderSelecting])?;
        let deployment = self.require_deployment("select bid")?;
        if !bid.belongs_to(&deployment) {
            return Err(WorkflowError::BidMismatch {
                expected: deployment.dseq,
                actual: bid.dseq,
            });
        }
        debug!(provider = %bid.provider, gseq = bid.gseq, oseq = bid.oseq, "Bid selected");
        self.selected_bid = Some(bid);
        Ok(())
    }

    /// Select the bid and confirm it in one call
    pub async fn accept_bid(&mut self, bid: BidSelection) -> Result<LeaseRecord, WorkflowError> {
        self.select_bid(bid)?;
        self.confirm_bid().await
    }

    /// Create a lease from the selected bid, then send the manifest.
    ///
    /// The manifest only goes out after a lease matching the selected bid came
    /// back. Any failure returns the workflow to provider selection.
    pub async fn confirm_bid(&mut self) -> Result<LeaseRecord, WorkflowError> {
        self.ensure_idle()?;
        self.expect_step("create lease", &[WorkflowStep::ProviderSelecting])?;
        let deployment = self.require_deployment("create lease")?;
        let bid = self
            .selected_bid
            .clone()
            .ok_or(WorkflowError::PreconditionMissing {
                action: "create lease",
                missing: "selected bid",
            })?;
        if !bid.belongs_to(&deployment) {
            return Err(WorkflowError::BidMismatch {
                expected: deployment.dseq,
                actual: bid.dseq,
            });
        }
        let signer = self.require_signer("create lease")?;
        let spec = self
            .spec
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(WorkflowError::PreconditionMissing {
                action: "create lease",
                missing: "workload specification",
            })?;

        self.dispatch(WorkflowEvent::LeaseRequested);

        let chain = Arc::clone(&self.collaborators.chain);
        let span = create_workflow_span(
            "create-lease",
            Some(deployment.dseq.as_str()),
            Some(&self.correlation_id),
        );
        self.begin_mutation(MutationKind::CreateLease);
        let result = self
            .lease_executor
            .execute(chain.create_lease(&bid))
            .instrument(span)
            .await;
        self.in_flight = None;

        let lease = match result {
            Ok(Some(lease)) if lease.matches_bid(&bid) => lease,
            Ok(Some(lease)) => {
                warn!(
                    expected_provider = %bid.provider,
                    provider = %lease.provider,
                    "Lease does not match the selected bid"
                );
                self.dispatch(WorkflowEvent::LeaseEmpty);
                return Err(WorkflowError::EmptyResult {
                    operation: MutationKind::CreateLease,
                });
            }
            Ok(None) => {
                self.dispatch(WorkflowEvent::LeaseEmpty);
                return Err(WorkflowError::EmptyResult {
                    operation: MutationKind::CreateLease,
                });
            }
            Err(e) => {
                self.dispatch(WorkflowEvent::LeaseFailed);
                return Err(WorkflowError::from_client(MutationKind::CreateLease, e));
            }
        };

        self.dispatch(WorkflowEvent::LeaseCreated {
            lease: lease.clone(),
        });

        let submission = ManifestSubmission {
            signer,
            lease: lease.clone(),
            spec,
        };
        let span = create_workflow_span(
            "send-manifest",
            Some(deployment.dseq.as_str()),
            Some(&self.correlation_id),
        );
        self.begin_mutation(MutationKind::SendManifest);
        let result = self
            .manifest_executor
            .execute(chain.send_manifest(&submission))
            .instrument(span)
            .await;
        self.in_flight = None;

        match result {
            Ok(()) => {
                self.dispatch(WorkflowEvent::ManifestSent);
                Ok(lease)
            }
            Err(e) => {
                self.dispatch(WorkflowEvent::ManifestFailed);
                Err(WorkflowError::from_client(MutationKind::SendManifest, e))
            }
        }
    }

    /// Current snapshot. A mutation whose future was dropped is not busy,
    /// even before [`settle_abandoned`](Self::settle_abandoned) has run.
    pub fn state(&self) -> StepState {
        let busy = self
            .in_flight
            .is_some_and(|kind| self.executor(kind).is_busy());
        self.snapshot(busy)
    }

    fn snapshot(&self, busy: bool) -> StepState {
        let machine = self.machine.inner();
        StepState {
            step: current_step(&self.machine),
            status_message: machine.status_message().to_string(),
            busy,
            intent_id: machine.intent_id().map(str::to_string),
            deployment: machine.deployment().cloned(),
            lease: machine.lease().cloned(),
        }
    }

    pub fn step(&self) -> WorkflowStep {
        current_step(&self.machine)
    }

    /// Receiver that sees every published state, including busy toggles
    pub fn subscribe(&self) -> watch::Receiver<StepState> {
        self.state_tx.subscribe()
    }

    pub fn history(&self) -> &[StepTransitionRecord] {
        &self.history
    }

    pub fn specification(&self) -> Option<&WorkloadSpecification> {
        self.spec.as_ref()
    }

    pub fn selected_bid(&self) -> Option<&BidSelection> {
        self.selected_bid.as_ref()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn is_busy(&self) -> bool {
        self.busy_executor().is_some()
    }

    /// Reset the step after a mutation future was dropped mid-flight.
    ///
    /// The executor flag clears itself on drop, but the machine still sits in
    /// the in-flight step; the mutation is reported as failed so the workflow
    /// returns to where it can be retried. Runs at the start of every
    /// operation; hosts may also call it after cancelling one.
    pub fn settle_abandoned(&mut self) {
        let Some(kind) = self.in_flight else {
            return;
        };
        if self.executor(kind).is_busy() {
            return;
        }

        warn!(
            operation = %kind,
            step = %self.step(),
            correlation_id = %self.correlation_id,
            "Mutation dropped before completing; resetting step"
        );
        self.in_flight = None;
        self.dispatch(match kind {
            MutationKind::CreateDeployment => WorkflowEvent::DeploymentFailed,
            MutationKind::CreateLease => WorkflowEvent::LeaseFailed,
            MutationKind::SendManifest => WorkflowEvent::ManifestFailed,
        });
    }

    /// Busy handles for the three executors, in workflow order
    pub fn busy_flags(&self) -> [(MutationKind, BusyFlag); 3] {
        [
            (self.deployment_executor.kind(), self.deployment_executor.busy_flag()),
            (self.lease_executor.kind(), self.lease_executor.busy_flag()),
            (self.manifest_executor.kind(), self.manifest_executor.busy_flag()),
        ]
    }

    fn busy_executor(&self) -> Option<MutationKind> {
        [
            &self.deployment_executor,
            &self.lease_executor,
            &self.manifest_executor,
        ]
        .into_iter()
        .find(|e| e.is_busy())
        .map(|e| e.kind())
    }

    fn executor(&self, kind: MutationKind) -> &MutationExecutor {
        match kind {
            MutationKind::CreateDeployment => &self.deployment_executor,
            MutationKind::CreateLease => &self.lease_executor,
            MutationKind::SendManifest => &self.manifest_executor,
        }
    }

    fn ensure_idle(&mut self) -> Result<(), WorkflowError> {
        self.settle_abandoned();
        match self.busy_executor() {
            Some(operation) => Err(WorkflowError::Busy { operation }),
            None => Ok(()),
        }
    }

    fn expect_step(
        &self,
        action: &'static str,
        allowed: &[WorkflowStep],
    ) -> Result<(), WorkflowError> {
        let step = self.step();
        if allowed.contains(&step) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition { action, step })
        }
    }

    fn require_signer(&self, action: &'static str) -> Result<String, WorkflowError> {
        self.collaborators
            .signer
            .address()
            .ok_or(WorkflowError::PreconditionMissing {
                action,
                missing: "signer address",
            })
    }

    fn require_deployment(&self, action: &'static str) -> Result<DeploymentIdentity, WorkflowError> {
        self.machine
            .inner()
            .deployment()
            .cloned()
            .ok_or(WorkflowError::PreconditionMissing {
                action,
                missing: "deployment identity",
            })
    }

    fn begin_mutation(&mut self, kind: MutationKind) {
        self.in_flight = Some(kind);
        self.publish();
    }

    fn dispatch(&mut self, event: WorkflowEvent) {
        let from = self.step();
        self.machine.handle(&event);
        let to = self.step();

        if from != to {
            info!(
                from = %from,
                to = %to,
                trigger = event.name(),
                correlation_id = %self.correlation_id,
                "Workflow step changed"
            );
            self.history.push(StepTransitionRecord {
                from,
                to,
                trigger: event.name().to_string(),
                timestamp: Utc::now(),
            });
        }
        self.publish();
    }

    fn publish(&self) {
        self.state_tx
            .send_replace(self.snapshot(self.in_flight.is_some()));
    }
}

use statig::prelude::*;
use tracing::{debug, info, warn};

use crate::workflow::resolver::Resolution;
use crate::workflow::types::*;

/// Inputs to the transition table: external triggers and mutation outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    Resume(Resolution),
    PreflightRequested { intent_id: String },
    PreflightPassed { deployment: Option<DeploymentIdentity> },
    DeploymentRequested,
    DeploymentCreated { deployment: DeploymentIdentity },
    DeploymentEmpty,
    DeploymentFailed,
    LeaseRequested,
    LeaseCreated { lease: LeaseRecord },
    LeaseEmpty,
    LeaseFailed,
    ManifestSent,
    ManifestFailed,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Resume(_) => "resume",
            WorkflowEvent::PreflightRequested { .. } => "preflight-requested",
            WorkflowEvent::PreflightPassed { .. } => "preflight-passed",
            WorkflowEvent::DeploymentRequested => "deployment-requested",
            WorkflowEvent::DeploymentCreated { .. } => "deployment-created",
            WorkflowEvent::DeploymentEmpty => "deployment-empty",
            WorkflowEvent::DeploymentFailed => "deployment-failed",
            WorkflowEvent::LeaseRequested => "lease-requested",
            WorkflowEvent::LeaseCreated { .. } => "lease-created",
            WorkflowEvent::LeaseEmpty => "lease-empty",
            WorkflowEvent::LeaseFailed => "lease-failed",
            WorkflowEvent::ManifestSent => "manifest-sent",
            WorkflowEvent::ManifestFailed => "manifest-failed",
        }
    }
}

/// Step bookkeeping driven by the statig transition table.
///
/// The machine never performs I/O; the orchestrator runs the mutations and
/// reports their outcomes back as events. The step is the statig state
/// itself, read through [`current_step`].
#[derive(Debug)]
pub struct WorkflowMachine {
    status_message: String,
    intent_id: Option<String>,
    deployment: Option<DeploymentIdentity>,
    lease: Option<LeaseRecord>,
}

impl Default for WorkflowMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowMachine {
    pub fn new() -> Self {
        Self {
            status_message: String::new(),
            intent_id: None,
            deployment: None,
            lease: None,
        }
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn intent_id(&self) -> Option<&str> {
        self.intent_id.as_deref()
    }

    pub fn deployment(&self) -> Option<&DeploymentIdentity> {
        self.deployment.as_ref()
    }

    pub fn lease(&self) -> Option<&LeaseRecord> {
        self.lease.as_ref()
    }
}

#[state_machine(initial = "State::configuring()")]
impl WorkflowMachine {
    #[state]
    fn configuring(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Resume(resolution) => self.resume(resolution),
            WorkflowEvent::PreflightRequested { intent_id } => {
                self.intent_id = Some(intent_id.clone());
                self.status_message.clear();
                info!(intent_id = %intent_id, "Entering preflight");
                Transition(State::preflight_checking())
            }
            _ => self.deployment_outcome(event),
        }
    }

    #[state]
    fn preflight_checking(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Resume(resolution) => self.resume(resolution),
            WorkflowEvent::PreflightPassed {
                deployment: Some(deployment),
            } => self.enter_provider_selection(deployment.clone()),
            WorkflowEvent::PreflightPassed { deployment: None } => {
                debug!("Preflight passed but no deployment is known yet; staying in preflight");
                Handled
            }
            _ => self.deployment_outcome(event),
        }
    }

    #[state]
    fn provider_selecting(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Resume(resolution) => self.resume(resolution),
            WorkflowEvent::LeaseRequested => {
                self.status_message = status::CREATING_LEASE.to_string();
                Transition(State::creating_lease())
            }
            _ => self.ignore(event),
        }
    }

    #[state]
    fn creating_lease(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::LeaseCreated { lease } => {
                self.lease = Some(lease.clone());
                self.status_message = status::SENDING_MANIFEST.to_string();
                info!(
                    provider = %lease.provider,
                    dseq = %lease.deployment.dseq,
                    "Lease created"
                );
                Transition(State::sending_manifest())
            }
            WorkflowEvent::LeaseEmpty => {
                self.status_message = status::LEASE_FAILED.to_string();
                Transition(State::provider_selecting())
            }
            WorkflowEvent::LeaseFailed => {
                self.status_message.clear();
                Transition(State::provider_selecting())
            }
            _ => self.ignore(event),
        }
    }

    #[state]
    fn sending_manifest(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::ManifestSent => {
                self.status_message.clear();
                info!(
                    deployment = ?self.deployment,
                    provider = ?self.lease.as_ref().map(|l| l.provider.as_str()),
                    "Manifest delivered"
                );
                Transition(State::completed())
            }
            WorkflowEvent::ManifestFailed => {
                self.lease = None;
                self.status_message.clear();
                Transition(State::provider_selecting())
            }
            _ => self.ignore(event),
        }
    }

    #[state]
    fn completed(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        self.ignore(event)
    }
}

/// Step of the machine's current statig state
pub fn current_step(machine: &StateMachine<WorkflowMachine>) -> WorkflowStep {
    match machine.state() {
        State::Configuring { .. } => WorkflowStep::Configuring,
        State::PreflightChecking { .. } => WorkflowStep::PreflightChecking,
        State::ProviderSelecting { .. } => WorkflowStep::ProviderSelecting,
        State::CreatingLease { .. } => WorkflowStep::CreatingLease,
        State::SendingManifest { .. } => WorkflowStep::SendingManifest,
        State::Completed { .. } => WorkflowStep::Completed,
    }
}

impl WorkflowMachine {
    fn resume(&mut self, resolution: &Resolution) -> Outcome<State> {
        match resolution.step {
            WorkflowStep::Configuring => {
                self.intent_id = None;
                self.deployment = None;
                self.lease = None;
                Transition(State::configuring())
            }
            WorkflowStep::PreflightChecking => {
                self.intent_id = resolution.intent_id.clone();
                self.deployment = None;
                self.lease = None;
                Transition(State::preflight_checking())
            }
            WorkflowStep::ProviderSelecting => match &resolution.deployment {
                Some(deployment) => {
                    self.intent_id = resolution.intent_id.clone();
                    self.lease = None;
                    self.deployment = Some(deployment.clone());
                    Transition(State::provider_selecting())
                }
                None => {
                    warn!("Resolution targets provider selection without a deployment; ignoring");
                    Handled
                }
            },
            other => {
                warn!(step = %other, "Resolution cannot target an in-flight or terminal step");
                Handled
            }
        }
    }

    /// Deployment creation outcomes, shared by configuring and preflight
    fn deployment_outcome(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::DeploymentRequested => {
                self.status_message = status::CREATING_DEPLOYMENT.to_string();
                Handled
            }
            WorkflowEvent::DeploymentCreated { deployment } => {
                self.enter_provider_selection(deployment.clone())
            }
            WorkflowEvent::DeploymentEmpty => {
                self.status_message = status::DEPLOYMENT_FAILED.to_string();
                Handled
            }
            WorkflowEvent::DeploymentFailed => {
                self.status_message.clear();
                Handled
            }
            _ => self.ignore(event),
        }
    }

    fn enter_provider_selection(&mut self, deployment: DeploymentIdentity) -> Outcome<State> {
        info!(owner = %deployment.owner, dseq = %deployment.dseq, "Deployment known; selecting provider");
        self.deployment = Some(deployment);
        self.status_message.clear();
        Transition(State::provider_selecting())
    }

    fn ignore(&self, event: &WorkflowEvent) -> Outcome<State> {
        debug!(event = event.name(), "Event not applicable in current step");
        Handled
    }
}

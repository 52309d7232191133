// Deployment workflow - create deployment, pick a bid, lease, send manifest
//
// The step state lives in one orchestrator per deployment. Chain, signer,
// storage, routing and preflight are injected behind traits so the whole
// workflow runs against fakes in tests.

pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod resolver;
pub mod state_machine;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use errors::{ClientError, FailureKind, WorkflowError};
pub use executor::{BusyFlag, MutationExecutor};
pub use orchestrator::{Collaborators, WorkflowOrchestrator};
pub use resolver::{HydratedResolution, Resolution, ResumptionResolver};
pub use state_machine::{current_step, WorkflowEvent, WorkflowMachine};
pub use traits::{ChainClient, Navigator, PreflightCheck, SignerProvider, StaticSigner};
pub use types::*;

// deploy-flow - marketplace deployment workflow
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod external;
pub mod storage;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{config, init_config, DeployFlowConfig};
pub use storage::{DeploymentStore, FileDeploymentStore, InMemoryDeploymentStore, PersistenceError};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{
    ClientError, Collaborators, FailureKind, ResumptionResolver, StepState, WorkflowError,
    WorkflowOrchestrator, WorkflowStep,
};

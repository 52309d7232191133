use thiserror::Error;

use crate::storage::PersistenceError;
use crate::workflow::types::{Dseq, MutationKind, WorkflowStep};

/// Coarse failure classes the workflow reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UserDeclined,
    NetworkOrQuery,
    EmptyResult,
    PreconditionMissing,
}

/// Errors reported by chain, signer and preflight collaborators.
///
/// Collaborators classify their own failures; the workflow never inspects
/// message text to tell a declined signature from a failed query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{operation} was declined by the signer")]
    Declined { operation: String },
    #[error("{operation} was rejected by the chain (code {code:?}): {log}")]
    Query {
        operation: String,
        code: Option<u32>,
        log: String,
    },
    #[error("{operation} could not reach the network: {message}")]
    Transport { operation: String, message: String },
    #[error("{operation} returned an unreadable response: {message}")]
    Malformed { operation: String, message: String },
}

impl ClientError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Declined { .. } => FailureKind::UserDeclined,
            ClientError::Query { .. }
            | ClientError::Transport { .. }
            | ClientError::Malformed { .. } => FailureKind::NetworkOrQuery,
        }
    }

    pub fn is_declined(&self) -> bool {
        self.kind() == FailureKind::UserDeclined
    }
}

/// Errors returned from orchestrator operations.
///
/// By the time one of these is returned the step state has already been reset;
/// the error tells the caller what happened, it does not leave the workflow in
/// an error step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{operation} was declined by the signer")]
    UserDeclined {
        operation: MutationKind,
        #[source]
        source: ClientError,
    },
    #[error("{operation} failed: {source}")]
    NetworkOrQuery {
        operation: MutationKind,
        #[source]
        source: ClientError,
    },
    #[error("{operation} returned no usable record")]
    EmptyResult { operation: MutationKind },
    #[error("Cannot {action}: {missing} is missing")]
    PreconditionMissing {
        action: &'static str,
        missing: &'static str,
    },
    #[error("Bid for deployment {actual} does not belong to deployment {expected}")]
    BidMismatch { expected: Dseq, actual: Dseq },
    #[error("Cannot {action} while in step {step}")]
    InvalidTransition {
        action: &'static str,
        step: WorkflowStep,
    },
    #[error("Cannot start {operation}: another operation is in flight")]
    Busy { operation: MutationKind },
    #[error("Workload specification is frozen once deployment {dseq} exists")]
    SpecificationFrozen { dseq: Dseq },
    #[error("Preflight check failed: {0}")]
    Preflight(#[source] ClientError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl WorkflowError {
    /// Map a collaborator failure for the given mutation onto the workflow taxonomy
    pub fn from_client(operation: MutationKind, source: ClientError) -> Self {
        match source.kind() {
            FailureKind::UserDeclined => WorkflowError::UserDeclined { operation, source },
            _ => WorkflowError::NetworkOrQuery { operation, source },
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            WorkflowError::UserDeclined { .. } => Some(FailureKind::UserDeclined),
            WorkflowError::NetworkOrQuery { .. } | WorkflowError::Preflight(_) => {
                Some(FailureKind::NetworkOrQuery)
            }
            WorkflowError::EmptyResult { .. } => Some(FailureKind::EmptyResult),
            WorkflowError::PreconditionMissing { .. } | WorkflowError::BidMismatch { .. } => {
                Some(FailureKind::PreconditionMissing)
            }
            WorkflowError::InvalidTransition { .. }
            | WorkflowError::Busy { .. }
            | WorkflowError::SpecificationFrozen { .. }
            | WorkflowError::Persistence(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let declined = ClientError::Declined {
            operation: "create-lease".to_string(),
        };
        assert!(declined.is_declined());

        let query = ClientError::Query {
            operation: "create-lease".to_string(),
            code: Some(6),
            log: "rpc error".to_string(),
        };
        assert_eq!(query.kind(), FailureKind::NetworkOrQuery);
    }

    #[test]
    fn test_workflow_error_keeps_declined_separate_from_network() {
        let declined = WorkflowError::from_client(
            MutationKind::SendManifest,
            ClientError::Declined {
                operation: "send-manifest".to_string(),
            },
        );
        assert!(matches!(declined, WorkflowError::UserDeclined { .. }));
        assert_eq!(declined.kind(), Some(FailureKind::UserDeclined));

        let transport = WorkflowError::from_client(
            MutationKind::SendManifest,
            ClientError::Transport {
                operation: "send-manifest".to_string(),
                message: "connection refused".to_string(),
            },
        );
        assert!(matches!(transport, WorkflowError::NetworkOrQuery { .. }));
    }
}

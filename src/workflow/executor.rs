// Mutation executor - one network-bound operation with a busy flag

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::workflow::errors::ClientError;
use crate::workflow::types::MutationKind;

/// Shared view of an executor's in-flight status
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, busy: bool) {
        self.0.store(busy, Ordering::SeqCst);
    }
}

/// Clears the flag when dropped, including when the operation future is dropped
struct BusyGuard(BusyFlag);

impl BusyGuard {
    fn engage(flag: &BusyFlag) -> Self {
        flag.set(true);
        Self(flag.clone())
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Wraps a single kind of chain mutation.
///
/// `execute` takes `&mut self`, so one executor can never run two calls at
/// once; the orchestrator owning all three executors extends that to the
/// whole workflow.
#[derive(Debug)]
pub struct MutationExecutor {
    kind: MutationKind,
    busy: BusyFlag,
    calls: u64,
    last_duration: Option<Duration>,
}

impl MutationExecutor {
    pub fn new(kind: MutationKind) -> Self {
        Self {
            kind,
            busy: BusyFlag::default(),
            calls: 0,
            last_duration: None,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Number of operations started by this executor
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn last_duration(&self) -> Option<Duration> {
        self.last_duration
    }

    /// Run the operation to completion. No retries.
    pub async fn execute<T, Fut>(&mut self, operation: Fut) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let guard = BusyGuard::engage(&self.busy);
        self.calls += 1;
        let started = Instant::now();
        debug!(operation = %self.kind, call = self.calls, "Mutation started");

        let result = operation.await;
        drop(guard);

        let elapsed = started.elapsed();
        self.last_duration = Some(elapsed);
        match &result {
            Ok(_) => info!(
                operation = %self.kind,
                duration_ms = elapsed.as_millis() as u64,
                "Mutation succeeded"
            ),
            Err(e) => warn!(
                operation = %self.kind,
                duration_ms = elapsed.as_millis() as u64,
                declined = e.is_declined(),
                error = %e,
                "Mutation failed"
            ),
        }
        result
    }
}

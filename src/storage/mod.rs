//! Durable key-value storage for deployment records
//!
//! Records are keyed by deployment sequence number and written once, right
//! after the deployment is created, so a later session can rebuild the
//! workload specification from a deep link.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::workflow::types::{Dseq, SavedDeployment};

mod file;

pub use file::FileDeploymentStore;

/// Errors that can occur during persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Lock acquisition failed: {reason}")]
    LockError { reason: String },
}

/// Key-value store for saved deployments
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn put(&self, dseq: &Dseq, record: &SavedDeployment) -> Result<(), PersistenceError>;

    async fn get(&self, dseq: &Dseq) -> Result<Option<SavedDeployment>, PersistenceError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryDeploymentStore {
    records: Mutex<HashMap<Dseq, SavedDeployment>>,
}

impl InMemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeploymentStore for InMemoryDeploymentStore {
    async fn put(&self, dseq: &Dseq, record: &SavedDeployment) -> Result<(), PersistenceError> {
        let mut records = self.records.lock().map_err(|e| PersistenceError::LockError {
            reason: e.to_string(),
        })?;
        records.insert(dseq.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, dseq: &Dseq) -> Result<Option<SavedDeployment>, PersistenceError> {
        let records = self.records.lock().map_err(|e| PersistenceError::LockError {
            reason: e.to_string(),
        })?;
        Ok(records.get(dseq).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::WorkloadSpecification;

    #[tokio::test]
    async fn test_in_memory_store_put_and_get() {
        let store = InMemoryDeploymentStore::new();
        let dseq = Dseq::new("42").unwrap();
        let spec = WorkloadSpecification::new("web", "version: \"2.0\"");

        assert!(store.get(&dseq).await.unwrap().is_none());

        store
            .put(&dseq, &SavedDeployment::new(&spec, "akash1owner"))
            .await
            .unwrap();

        let saved = store.get(&dseq).await.unwrap().unwrap();
        assert_eq!(saved.name, "web");
        assert_eq!(saved.specification(), spec);
        assert_eq!(store.len(), 1);
    }
}

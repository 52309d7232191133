use async_trait::async_trait;
use fd_lock::RwLock;
use std::fs::{self as stdfs, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::{DeploymentStore, PersistenceError};
use crate::workflow::types::{Dseq, SavedDeployment};

const LOCK_FILE: &str = ".deployments.lock";

/// File system store: one JSON document per deployment under `root`
#[derive(Debug, Clone)]
pub struct FileDeploymentStore {
    root: PathBuf,
}

impl FileDeploymentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, dseq: &Dseq) -> PathBuf {
        self.root.join(format!("{dseq}.json"))
    }
}

/// Write the record while holding the directory's exclusive lock.
/// The file is written to a temporary name and renamed into place.
fn write_locked(root: &Path, path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    stdfs::create_dir_all(root)?;

    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(root.join(LOCK_FILE))?;
    let mut lock = RwLock::new(lock_file);
    let _guard = lock.write()?;

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = stdfs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    stdfs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl DeploymentStore for FileDeploymentStore {
    async fn put(&self, dseq: &Dseq, record: &SavedDeployment) -> Result<(), PersistenceError> {
        let contents = serde_json::to_vec_pretty(record)?;
        let root = self.root.clone();
        let path = self.record_path(dseq);
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_locked(&root, &target, &contents))
            .await
            .map_err(|e| PersistenceError::LockError {
                reason: format!("writer task failed: {e}"),
            })??;

        info!(dseq = %dseq, path = ?path, "Saved deployment record");
        Ok(())
    }

    async fn get(&self, dseq: &Dseq) -> Result<Option<SavedDeployment>, PersistenceError> {
        let path = self.record_path(dseq);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dseq = %dseq, "No saved deployment record");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

//! Start-time store implementations.
//!
//! [`FileStartTimeStore`] keeps the `(job id -> original start time)`
//! map in a small JSON file so it survives a full client restart.
//! [`MemoryStartTimeStore`] backs tests.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use lumeo_core::error::CoreError;
use lumeo_core::store::StartTimeStore;
use lumeo_core::types::{JobId, Timestamp};

/// JSON-file-backed store.
///
/// The whole map is rewritten on every change; it holds at most a
/// handful of entries (one per in-flight job, and the controller is
/// single-flight).
pub struct FileStartTimeStore {
    path: PathBuf,
    records: Mutex<HashMap<JobId, Timestamp>>,
}

impl FileStartTimeStore {
    /// Open the store, loading any records a previous run left behind.
    ///
    /// A missing file is an empty store; a corrupt file is an error so
    /// the caller can decide whether to discard it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CoreError::Store(format!("corrupt store file {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(CoreError::Store(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn persist(&self, records: &HashMap<JobId, Timestamp>) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Store(format!("failed to create {}: {e}", parent.display())))?;
        }

        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| CoreError::Store(format!("failed to encode store: {e}")))?;

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| CoreError::Store(format!("failed to write {}: {e}", self.path.display())))
    }
}

#[async_trait]
impl StartTimeStore for FileStartTimeStore {
    async fn get(&self, job_id: JobId) -> Result<Option<Timestamp>, CoreError> {
        Ok(self.records.lock().await.get(&job_id).copied())
    }

    async fn put(&self, job_id: JobId, started_at: Timestamp) -> Result<(), CoreError> {
        let mut records = self.records.lock().await;
        records.insert(job_id, started_at);
        self.persist(&records).await
    }

    async fn remove(&self, job_id: JobId) -> Result<(), CoreError> {
        let mut records = self.records.lock().await;
        if records.remove(&job_id).is_some() {
            self.persist(&records).await?;
        }
        Ok(())
    }
}

/// In-memory store for tests. Forgets everything on drop.
#[derive(Default)]
pub struct MemoryStartTimeStore {
    records: Mutex<HashMap<JobId, Timestamp>>,
}

impl MemoryStartTimeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StartTimeStore for MemoryStartTimeStore {
    async fn get(&self, job_id: JobId) -> Result<Option<Timestamp>, CoreError> {
        Ok(self.records.lock().await.get(&job_id).copied())
    }

    async fn put(&self, job_id: JobId, started_at: Timestamp) -> Result<(), CoreError> {
        self.records.lock().await.insert(job_id, started_at);
        Ok(())
    }

    async fn remove(&self, job_id: JobId) -> Result<(), CoreError> {
        self.records.lock().await.remove(&job_id);
        Ok(())
    }
}

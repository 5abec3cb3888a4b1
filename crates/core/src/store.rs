//! Durable `(job id -> original start time)` record store.
//!
//! The timeout supervisor measures from the *original* submission
//! time, so the record must survive a full client restart -- a reload
//! never grants extra runtime. Keyed by job id so historical jobs
//! never collide.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Durable key-value store for job start times.
///
/// Written at attach, deleted at detach. `lumeo-tracker` ships a
/// JSON-file implementation and an in-memory fake for tests.
#[async_trait]
pub trait StartTimeStore: Send + Sync {
    /// The persisted start time for `job_id`, if one exists.
    async fn get(&self, job_id: JobId) -> Result<Option<Timestamp>, CoreError>;

    /// Persist the start time for `job_id`, overwriting any previous
    /// record for the same id.
    async fn put(&self, job_id: JobId, started_at: Timestamp) -> Result<(), CoreError>;

    /// Delete the record for `job_id`. Removing a missing record is
    /// not an error.
    async fn remove(&self, job_id: JobId) -> Result<(), CoreError>;
}

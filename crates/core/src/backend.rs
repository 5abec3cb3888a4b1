//! Pull-side backend operations the tracker depends on.
//!
//! Abstracted behind a trait so the engine is testable against an
//! in-memory fake; `lumeo-client` provides the HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::job::{Job, JobType};
use crate::types::JobId;

/// A newly created job as acknowledged by the backend.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job: Job,
    /// Credits the backend estimates the job will consume, when it
    /// reports one. Logged, not accounted.
    pub credits_estimated: Option<i64>,
}

/// Backend operations issued over the pull path.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Create a job. An `Err` means no job id exists and no tracking
    /// begins.
    async fn create_job(
        &self,
        job_type: JobType,
        parameters: &serde_json::Value,
    ) -> Result<SubmittedJob, CoreError>;

    /// Fetch the current job row by id.
    async fn fetch_job(&self, job_id: JobId) -> Result<Job, CoreError>;

    /// The most recent non-terminal job owned by the current user
    /// created within `window`, if any.
    async fn recent_active_job(&self, window: Duration) -> Result<Option<Job>, CoreError>;

    /// Request deletion of a queued or running job.
    async fn cancel_job(&self, job_id: JobId) -> Result<(), CoreError>;

    /// Fallback lookup for the assets a completed job produced, used
    /// when the completion payload carried none.
    async fn fetch_outputs(&self, job_id: JobId) -> Result<Vec<String>, CoreError>;
}

//! Error taxonomy for the job-tracking core.
//!
//! Only `Submission`, a backend-reported `failed` status, and a forced
//! timeout are user-visible failures. Everything else degrades silently
//! behind the redundancy of the remaining channels.

use thiserror::Error;

use crate::types::JobId;

/// Errors surfaced by the job-tracking core and its trait seams.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Job creation failed before the backend assigned an id.
    /// No tracking begins.
    #[error("job submission failed: {0}")]
    Submission(String),

    /// The controller is single-flight; a job is already tracked.
    #[error("job {0} is already being tracked")]
    AlreadyTracking(JobId),

    /// One channel failed transiently (fetch error, subscription drop).
    /// Non-fatal; the remaining channels compensate.
    #[error("channel unavailable: {0}")]
    Channel(String),

    /// The recovery lookup failed. Treated exactly like "no active job
    /// found" so the controller starts idle instead of stuck.
    #[error("recovery query failed: {0}")]
    RecoveryQuery(String),

    /// The durable start-time store could not be read or written.
    #[error("start-time store error: {0}")]
    Store(String),

    /// The cancel request to the backend failed. Local state is still
    /// locked to `Cancelled`.
    #[error("failed to cancel job {job_id}: {reason}")]
    Cancel { job_id: JobId, reason: String },
}

//! Job kinds, lifecycle statuses, and the canonical job record.
//!
//! The status partial order lives here because every other component
//! (merge logic, adapters, timeout supervisor) depends on it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Maximum wall-clock runtime for image generation jobs.
pub const IMAGE_TIMEOUT: Duration = Duration::from_secs(180);

/// Maximum wall-clock runtime for video generation jobs.
pub const VIDEO_TIMEOUT: Duration = Duration::from_secs(600);

/// Kinds of generation work the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Image,
    Video,
}

impl JobType {
    /// Timeout budget for this job kind, measured from the *original*
    /// submission time (durable across client restarts).
    pub fn timeout_budget(self) -> Duration {
        match self {
            JobType::Image => IMAGE_TIMEOUT,
            JobType::Video => VIDEO_TIMEOUT,
        }
    }
}

/// Lifecycle status of a job.
///
/// Statuses advance along `Pending < Queued < Processing < terminal`.
/// All four terminal values share the highest rank and are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    /// Forced by the timeout supervisor when a job exceeds its budget.
    /// The backend never reports this value; it is distinct from
    /// `Failed` because the backend never reported a failure either.
    TimedOut,
}

impl JobStatus {
    /// Position in the lifecycle partial order.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Queued => 1,
            JobStatus::Processing => 2,
            JobStatus::Completed
            | JobStatus::Failed
            | JobStatus::Cancelled
            | JobStatus::TimedOut => 3,
        }
    }

    /// Whether this status is absorbing.
    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }
}

/// A job record as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Completion percentage (0-100).
    pub progress: i16,
    /// Pipeline step currently executing, if the backend reports one.
    pub current_stage: Option<String>,
    /// Asset references produced by the job, present once completed.
    pub outputs: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

//! Update messages flowing from the channels into the reconciler.
//!
//! Every channel, whatever its transport, reduces to a stream of
//! [`JobUpdate`]s: partial, possibly stale snapshots of one job. The
//! merge logic in [`crate::reconcile`] is the only consumer.

use chrono::Utc;

use crate::job::{Job, JobStatus};
use crate::types::{JobId, Timestamp};

/// Which channel produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Fixed-interval fetch of the job row.
    Polling,
    /// Row-level change feed subscription.
    Feed,
    /// Typed event from the session socket.
    Socket,
    /// Injected by the timeout supervisor.
    Supervisor,
    /// Injected by an explicit user cancellation.
    Cancel,
}

/// A partial, possibly stale snapshot of one job.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job_id: JobId,
    pub status: Option<JobStatus>,
    pub progress: Option<i16>,
    pub current_stage: Option<String>,
    pub outputs: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub source: UpdateSource,
    /// Local receipt time. Diagnostic only -- arrival order carries no
    /// authority in the merge.
    pub received_at: Timestamp,
}

impl JobUpdate {
    /// Full-row update, as delivered by polling and the row feed.
    pub fn from_row(job: &Job, source: UpdateSource) -> Self {
        Self {
            job_id: job.id,
            status: Some(job.status),
            progress: Some(job.progress),
            current_stage: job.current_stage.clone(),
            outputs: job.outputs.clone(),
            error_message: job.error_message.clone(),
            source,
            received_at: Utc::now(),
        }
    }

    /// Status-only update, as injected by the supervisor and by cancel.
    pub fn status_only(job_id: JobId, status: JobStatus, source: UpdateSource) -> Self {
        Self {
            job_id,
            status: Some(status),
            progress: None,
            current_stage: None,
            outputs: None,
            error_message: None,
            source,
            received_at: Utc::now(),
        }
    }
}

/// A typed event from the session socket.
///
/// The socket is shared across all jobs for the session; consumers
/// filter by [`JobEvent::job_id`].
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The job made progress.
    Progress {
        job_id: JobId,
        /// Completion percentage (0-100).
        progress: i16,
        /// Pipeline step currently executing, if known.
        stage: Option<String>,
    },

    /// The job completed successfully.
    Completed {
        job_id: JobId,
        outputs: Vec<String>,
    },

    /// The job failed with an error.
    Failed {
        job_id: JobId,
        error: String,
    },
}

impl JobEvent {
    /// The job this event refers to.
    pub fn job_id(&self) -> JobId {
        match *self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. } => job_id,
        }
    }

    /// Convert into the update the reconciler consumes.
    ///
    /// A progress event implies the job is processing; completion and
    /// failure carry their terminal status.
    pub fn into_update(self) -> JobUpdate {
        match self {
            JobEvent::Progress {
                job_id,
                progress,
                stage,
            } => JobUpdate {
                job_id,
                status: Some(JobStatus::Processing),
                progress: Some(progress),
                current_stage: stage,
                outputs: None,
                error_message: None,
                source: UpdateSource::Socket,
                received_at: Utc::now(),
            },
            JobEvent::Completed { job_id, outputs } => JobUpdate {
                job_id,
                status: Some(JobStatus::Completed),
                progress: None,
                current_stage: None,
                outputs: Some(outputs),
                error_message: None,
                source: UpdateSource::Socket,
                received_at: Utc::now(),
            },
            JobEvent::Failed { job_id, error } => JobUpdate {
                job_id,
                status: Some(JobStatus::Failed),
                progress: None,
                current_stage: None,
                outputs: None,
                error_message: Some(error),
                source: UpdateSource::Socket,
                received_at: Utc::now(),
            },
        }
    }
}

//! Push-channel seams the tracker consumes.
//!
//! The row feed is per-job (subscribed and torn down with each attach);
//! the session socket is shared across all jobs and filtered by the
//! consumer.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::CoreError;
use crate::job::Job;
use crate::types::JobId;
use crate::update::JobEvent;

/// Row-level change feed for a single job.
#[async_trait]
pub trait JobFeed: Send + Sync {
    /// Subscribe to full-row snapshots for `job_id`.
    ///
    /// Dropping the receiver tears the subscription down.
    async fn subscribe(&self, job_id: JobId) -> Result<mpsc::Receiver<Job>, CoreError>;
}

/// Session-wide socket event source.
///
/// One connection serves every job in the session; each subscriber
/// receives every event and filters by job id. Connection drops and
/// reconnects are internal and never reset job tracking.
pub trait EventSocket: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;
}

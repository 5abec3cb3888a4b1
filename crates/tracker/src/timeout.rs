//! Per-job wall-clock timeout supervisor.
//!
//! Measures from the *original* submission time (read from the durable
//! store at attach), so a client restart never grants extra runtime.
//! When the budget is exceeded the supervisor injects a `TimedOut`
//! update through the same fan-in queue as every other channel; the
//! reconciler adopts it, locks the state, and detaches.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lumeo_core::job::{JobStatus, JobType};
use lumeo_core::types::{JobId, Timestamp};
use lumeo_core::update::{JobUpdate, UpdateSource};

/// Default interval between deadline checks.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Whether a job started at `started_at` has exceeded its budget at
/// `now`.
pub fn is_expired(now: Timestamp, job_type: JobType, started_at: Timestamp) -> bool {
    let budget = chrono::Duration::from_std(job_type.timeout_budget())
        .unwrap_or_else(|_| chrono::Duration::MAX);
    now - started_at > budget
}

/// Run the deadline check loop. Fires at most once, then exits.
pub(crate) async fn run(
    job_id: JobId,
    job_type: JobType,
    started_at: Timestamp,
    check_interval: Duration,
    update_tx: mpsc::Sender<JobUpdate>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(check_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let now = Utc::now();
                if is_expired(now, job_type, started_at) {
                    tracing::warn!(
                        job_id,
                        ?job_type,
                        started_at = %started_at,
                        elapsed_secs = (now - started_at).num_seconds(),
                        "Job exceeded its timeout budget, forcing timed_out",
                    );
                    let _ = update_tx
                        .send(JobUpdate::status_only(
                            job_id,
                            JobStatus::TimedOut,
                            UpdateSource::Supervisor,
                        ))
                        .await;
                    break;
                }
            }
        }
    }

    tracing::debug!(job_id, "Timeout supervisor stopped");
}

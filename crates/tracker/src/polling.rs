//! Pull-based polling adapter.
//!
//! Fetches the job row on a fixed interval and forwards it as a
//! full-snapshot update. A failed fetch is suppressed and retried next
//! tick; the push channels cover the gap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lumeo_core::backend::JobBackend;
use lumeo_core::types::JobId;
use lumeo_core::update::{JobUpdate, UpdateSource};

/// Default interval between job-row fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Run the poll loop until the token is cancelled or the reconciler
/// goes away.
pub(crate) async fn run(
    backend: Arc<dyn JobBackend>,
    job_id: JobId,
    interval: Duration,
    update_tx: mpsc::Sender<JobUpdate>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match backend.fetch_job(job_id).await {
                    Ok(row) => {
                        if update_tx
                            .send(JobUpdate::from_row(&row, UpdateSource::Polling))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(job_id, error = %e, "Poll fetch failed, retrying next tick");
                    }
                }
            }
        }
    }

    tracing::debug!(job_id, "Polling adapter stopped");
}

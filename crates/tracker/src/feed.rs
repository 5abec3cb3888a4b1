//! Row-feed adapter.
//!
//! Subscribes to row-level change notifications for exactly the
//! tracked job id and forwards each full-row snapshot. A failed
//! subscription or a dropped stream is non-fatal -- polling and the
//! socket compensate -- and the next attach subscribes afresh.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lumeo_core::channel::JobFeed;
use lumeo_core::types::JobId;
use lumeo_core::update::{JobUpdate, UpdateSource};

/// Pump feed rows into the fan-in queue until the token is cancelled.
pub(crate) async fn run(
    feed: Arc<dyn JobFeed>,
    job_id: JobId,
    update_tx: mpsc::Sender<JobUpdate>,
    cancel: CancellationToken,
) {
    let mut rows = match feed.subscribe(job_id).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(job_id, error = %e, "Feed subscription failed, other channels compensate");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            row = rows.recv() => match row {
                Some(row) => {
                    if row.id != job_id {
                        tracing::debug!(job_id, other = row.id, "Dropping feed row for other job");
                        continue;
                    }
                    if update_tx
                        .send(JobUpdate::from_row(&row, UpdateSource::Feed))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                None => {
                    tracing::debug!(job_id, "Feed stream ended");
                    break;
                }
            },
        }
    }

    // Dropping the receiver tears the subscription down.
    tracing::debug!(job_id, "Feed adapter stopped");
}

//! Session-socket adapter.
//!
//! The socket is shared across all jobs in the session; this adapter
//! filters the broadcast stream down to the tracked id and forwards
//! matching events. Lagging behind the broadcast buffer loses events,
//! not correctness -- the next poll carries the same facts.

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use lumeo_core::types::JobId;
use lumeo_core::update::{JobEvent, JobUpdate};

/// Forward matching socket events into the fan-in queue until the
/// token is cancelled.
pub(crate) async fn run(
    mut events: broadcast::Receiver<JobEvent>,
    job_id: JobId,
    update_tx: mpsc::Sender<JobUpdate>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if event.job_id() != job_id {
                        continue;
                    }
                    if update_tx.send(event.into_update()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(job_id, skipped, "Socket adapter lagged behind event stream");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!(job_id, "Socket event stream closed");
                    break;
                }
            },
        }
    }

    tracing::debug!(job_id, "Socket adapter stopped");
}

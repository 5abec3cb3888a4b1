//! Row-level change feed for a single job.
//!
//! Subscribes to the backend's per-job feed endpoint; every text frame
//! carries a full job row. The subscription lives exactly as long as
//! the tracked job: the tracker drops the receiver on detach, which
//! ends the pump task and closes the connection.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use lumeo_core::channel::JobFeed;
use lumeo_core::error::CoreError;
use lumeo_core::job::Job;
use lumeo_core::types::JobId;

use crate::socket::WsStream;

/// Buffered rows per subscription.
const FEED_BUFFER: usize = 16;

/// WebSocket-backed row feed.
pub struct RowFeed {
    ws_url: String,
}

impl RowFeed {
    /// Create a feed client.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:3000`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }
}

#[async_trait]
impl JobFeed for RowFeed {
    async fn subscribe(&self, job_id: JobId) -> Result<mpsc::Receiver<Job>, CoreError> {
        let url = format!("{}/ws/jobs/{}/feed", self.ws_url, job_id);

        let (ws_stream, _response) = connect_async(&url)
            .await
            .map_err(|e| CoreError::Channel(format!("row feed subscription failed: {e}")))?;

        tracing::debug!(job_id, "Row feed subscribed");

        let (row_tx, row_rx) = mpsc::channel(FEED_BUFFER);
        tokio::spawn(pump_rows(ws_stream, job_id, row_tx));

        Ok(row_rx)
    }
}

/// Forward row snapshots until the connection drops or the receiver is
/// gone. A dropped connection is not retried here -- polling covers the
/// gap, and the next attach re-subscribes.
async fn pump_rows(mut ws_stream: WsStream, job_id: JobId, row_tx: mpsc::Sender<Job>) {
    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<Job>(&text) {
                Ok(row) => {
                    if row_tx.send(row).await.is_err() {
                        // Receiver dropped: the job was detached.
                        tracing::debug!(job_id, "Row feed unsubscribed");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Failed to parse feed row");
                }
            },
            Ok(Message::Close(frame)) => {
                tracing::info!(job_id, ?frame, "Row feed closed by backend");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Row feed receive error");
                return;
            }
        }
    }
}

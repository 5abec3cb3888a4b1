//! Shared per-session WebSocket connection to the backend.
//!
//! One [`SocketSession`] serves every job in the client session. It
//! connects, parses typed messages into [`JobEvent`]s, fans them out
//! over a broadcast channel, and reconnects with exponential backoff
//! when the connection drops. A reconnect never resets job tracking --
//! subscribers keep their receivers across connections.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream};
use tokio_util::sync::CancellationToken;

use lumeo_core::channel::EventSocket;
use lumeo_core::update::JobEvent;

use crate::messages::parse_message;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for socket events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The raw stream type produced by [`SocketClient::connect`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection configuration for the session socket endpoint.
pub struct SocketClient {
    ws_url: String,
}

/// A live WebSocket connection to the backend event endpoint.
pub struct SocketConnection {
    /// Unique client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading frames.
    pub ws_stream: WsStream,
}

/// Errors from the session-socket layer.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Failed to establish the WebSocket connection.
    #[error("connection error: {0}")]
    Connection(String),
}

impl SocketClient {
    /// Create a new client targeting the backend socket endpoint.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:3000`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// WebSocket base URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the backend event endpoint.
    ///
    /// Generates a unique `client_id` (UUID v4) and appends it as a
    /// query parameter so the backend can address messages back to
    /// this specific session.
    pub async fn connect(&self) -> Result<SocketConnection, SocketError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws/events?client_id={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            SocketError::Connection(format!(
                "failed to connect to backend socket at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %client_id,
            "Connected to backend socket at {}",
            self.ws_url,
        );

        Ok(SocketConnection {
            client_id,
            ws_stream,
        })
    }
}

/// Long-lived session socket shared across all tracked jobs.
///
/// Created once at client startup via [`SocketSession::start`]. The
/// returned `Arc` can be cheaply cloned wherever events are consumed.
pub struct SocketSession {
    event_tx: broadcast::Sender<JobEvent>,
    /// Cancelled during shutdown.
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SocketSession {
    /// Spawn the connection task and return a shared handle.
    pub fn start(ws_url: String) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let client = SocketClient::new(ws_url);
        let tx = event_tx.clone();
        let task_cancel = cancel.clone();

        let task_handle = tokio::spawn(async move {
            run_session_loop(&client, &tx, &task_cancel).await;
            tracing::info!("Session socket task exited");
        });

        Arc::new(Self {
            event_tx,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    /// Subscribe to the shared event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Gracefully shut the connection task down, waiting up to five
    /// seconds for a clean exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.task_handle.lock().await.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        }
    }
}

impl EventSocket for SocketSession {
    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }
}

/// Core session loop: connect -> process frames -> reconnect.
///
/// Runs until the cancellation token is triggered.
async fn run_session_loop(
    client: &SocketClient,
    event_tx: &broadcast::Sender<JobEvent>,
    cancel: &CancellationToken,
) {
    let reconnect_config = ReconnectConfig::default();

    loop {
        let conn = match client.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Socket connection failed, entering reconnect loop");
                match reconnect_loop(client, &reconnect_config, cancel).await {
                    Some(conn) => conn,
                    None => return, // cancelled
                }
            }
        };

        let mut ws_stream = conn.ws_stream;
        process_frames(&mut ws_stream, event_tx, cancel).await;

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!("Socket connection lost, entering reconnect loop");
        match reconnect_loop(client, &reconnect_config, cancel).await {
            Some(_) => continue,
            None => return, // cancelled
        }
    }
}

/// Process WebSocket frames until the connection drops or the session
/// is cancelled.
///
/// Each text frame is parsed via [`parse_message`]; the resulting event
/// is broadcast to all subscribers. Binary frames (previews) are
/// ignored; pings and pongs are handled by tungstenite.
async fn process_frames(
    ws_stream: &mut WsStream,
    event_tx: &broadcast::Sender<JobEvent>,
    cancel: &CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = ws_stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match parse_message(&text) {
                Ok(msg) => {
                    // Ignore the SendError -- it only means there are
                    // zero receivers right now.
                    let _ = event_tx.send(JobEvent::from(msg));
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        raw_message = %text,
                        "Failed to parse socket message",
                    );
                }
            },
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!("Ignoring binary socket message");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Backend socket closed");
                return;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(error = %e, "Socket receive error");
                return;
            }
            None => return,
        }
    }
}

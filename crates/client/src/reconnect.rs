//! Exponential-backoff reconnection for the session socket.
//!
//! When the connection drops, [`reconnect_loop`] keeps retrying with
//! increasing delays until either a connection is restored or the
//! [`CancellationToken`] fires. Job tracking is untouched either way:
//! the other channels keep delivering while the socket is down.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::socket::{SocketClient, SocketConnection};

/// Tunable parameters for the exponential-backoff strategy.
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Retry the socket connection with exponential backoff.
///
/// Returns `Some(connection)` once a connection succeeds, or `None` if
/// the `cancel` token fires before one does.
pub async fn reconnect_loop(
    client: &SocketClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<SocketConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        tracing::info!(
            url = client.ws_url(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to backend socket",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Socket reconnect cancelled");
                return None;
            }
            result = client.connect() => {
                match result {
                    Ok(conn) => {
                        tracing::info!(attempt, "Backend socket reconnected");
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Reconnect attempt {attempt} failed");
                    }
                }
            }
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_by_default() {
        let config = ReconnectConfig::default();
        assert_eq!(
            next_delay(Duration::from_secs(2), &config),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn delay_is_clamped_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(
            next_delay(Duration::from_secs(8), &config),
            Duration::from_secs(10)
        );
        assert_eq!(
            next_delay(Duration::from_secs(10), &config),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn backoff_sequence_reaches_ceiling() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30];

        for &secs in &expected {
            assert_eq!(delay.as_secs(), secs);
            delay = next_delay(delay, &config);
        }
    }

    #[tokio::test]
    async fn cancellation_stops_reconnect() {
        let cancel = CancellationToken::new();
        // Cancel up front -- the loop must return None without connecting.
        cancel.cancel();

        let client = SocketClient::new("ws://localhost:9999".into());
        let config = ReconnectConfig::default();

        let result = reconnect_loop(&client, &config, &cancel).await;
        assert!(result.is_none());
    }
}

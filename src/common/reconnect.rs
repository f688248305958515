//! Exponential backoff reconnection logic.

use std::time::Duration;

use backon::BackoffBuilder;
use tokio::sync::watch;
use tracing::info;

/// Longest wait between reconnection attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5 * 60);

/// Create an exponential backoff iterator for reconnection.
/// 5s initial, 5min max, factor 1.1, with jitter, unlimited retries.
fn reconnect_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_factor(1.1)
        .with_jitter()
        .without_max_times()
        .build()
}

/// Reconnect delays that start over after every successful connection.
pub struct ReconnectDelays {
    backoff: Box<dyn Iterator<Item = Duration> + Send>,
}

impl ReconnectDelays {
    pub fn new() -> Self {
        Self {
            backoff: Box::new(reconnect_backoff()),
        }
    }

    /// Call once a connection is established.
    pub fn reset(&mut self) {
        self.backoff = Box::new(reconnect_backoff());
    }

    pub fn next_delay(&mut self) -> Duration {
        self.backoff.next().unwrap_or(MAX_RECONNECT_DELAY)
    }
}

impl Default for ReconnectDelays {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true if shutdown has been requested.
pub fn shutdown_requested(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow()
}

/// Sleep for `delay` unless shutdown arrives first.
///
/// Returns `false` if the caller should stop reconnecting.
pub async fn wait_before_reconnect(
    what: &str,
    delay: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    info!("Reconnecting to {} in {:.1} seconds...", what, delay.as_secs_f64());

    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        result = shutdown_rx.changed() => {
            if result.is_err() || *shutdown_rx.borrow() {
                info!("Shutdown signal received during backoff");
                false
            } else {
                true
            }
        }
    }
}

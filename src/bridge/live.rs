//! "Went live" notifications.
//!
//! Signals from the live feed are edge-triggered against the broadcast id in
//! the store: only the offline -> live transition notifies.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::bridge::orchestrator::Platform;
use crate::bridge::subscriptions::SubscriptionStore;
use crate::common::{Destination, LiveSignal};

/// Posts a notification to every enabled channel when the stream goes live.
pub struct LiveNotifier<P: Platform> {
    store: Arc<SubscriptionStore>,
    platform: Arc<P>,
    /// Notification text, `%id` is replaced with the broadcast id.
    message: String,
}

impl<P: Platform> LiveNotifier<P> {
    pub fn new(store: Arc<SubscriptionStore>, platform: Arc<P>, message: impl Into<String>) -> Self {
        Self {
            store,
            platform,
            message: message.into(),
        }
    }

    /// Process signals until the feed closes or shutdown is requested.
    pub async fn run(
        self,
        mut signal_rx: mpsc::UnboundedReceiver<LiveSignal>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                signal = signal_rx.recv() => {
                    match signal {
                        Some(signal) => {
                            self.handle(signal).await;
                        }
                        None => break,
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Live notifier stopped");
    }

    /// Apply one signal. Returns the number of notifications sent.
    pub async fn handle(&self, signal: LiveSignal) -> usize {
        let current = self.store.live().await.broadcast_id;

        match (current, signal.live) {
            (None, true) => {
                let id = signal.broadcast_id.unwrap_or_default();
                info!("Stream went live (broadcast {})", id);
                if let Err(e) = self.store.set_broadcast(Some(id.clone())).await {
                    error!("Failed to save broadcast id: {}", e);
                }
                self.notify(&id).await
            }
            (Some(current), true) => {
                if let Some(id) = signal.broadcast_id.filter(|id| *id != current) {
                    debug!("Broadcast id changed from {} to {}", current, id);
                    if let Err(e) = self.store.set_broadcast(Some(id)).await {
                        error!("Failed to save broadcast id: {}", e);
                    }
                }
                0
            }
            (Some(current), false) => {
                info!("Stream went offline (broadcast {})", current);
                if let Err(e) = self.store.set_broadcast(None).await {
                    error!("Failed to clear broadcast id: {}", e);
                }
                0
            }
            (None, false) => 0,
        }
    }

    async fn notify(&self, broadcast_id: &str) -> usize {
        let text = self.message.replace("%id", broadcast_id);
        let targets = self.store.read().await.live_targets();
        let mut sent = 0;

        for (channel, role) in targets {
            let destination = Destination::Channel(channel);
            let Some(handle) = self.platform.resolve(destination).await else {
                warn!("Could not resolve {} for live notification", destination);
                continue;
            };

            let content = match role {
                Some(role) => format!("<@&{}> {}", role, text),
                None => text.clone(),
            };
            match self.platform.send(&handle, content).await {
                Ok(()) => sent += 1,
                Err(e) => warn!("Live notification to {} failed: {}", destination, e),
            }
        }

        info!("Sent {} live notification(s)", sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::orchestrator::tests::MockPlatform;
    use crate::bridge::subscriptions::{NoopSaveHook, Subscriptions};

    fn live(id: &str) -> LiveSignal {
        LiveSignal {
            live: true,
            broadcast_id: Some(id.to_string()),
        }
    }

    fn offline() -> LiveSignal {
        LiveSignal {
            live: false,
            broadcast_id: None,
        }
    }

    async fn setup() -> (LiveNotifier<MockPlatform>, Arc<SubscriptionStore>, Arc<MockPlatform>) {
        let store = Arc::new(SubscriptionStore::new(
            Subscriptions::default(),
            Box::new(NoopSaveHook),
        ));
        let platform = Arc::new(
            MockPlatform::default()
                .with_channel(1, false)
                .with_channel(2, false)
                .with_channel(3, false),
        );
        store.set_live_enabled(1, true).await.unwrap();
        store.set_live_enabled(2, true).await.unwrap();
        store.set_live_role(2, Some(77)).await.unwrap();
        store.set_live_enabled(3, false).await.unwrap();

        let notifier = LiveNotifier::new(store.clone(), platform.clone(), "live at %id");
        (notifier, store, platform)
    }

    #[tokio::test]
    async fn test_offline_to_live_notifies_once() {
        let (notifier, store, platform) = setup().await;

        assert_eq!(notifier.handle(live("abc123")).await, 2);
        assert_eq!(store.live().await.broadcast_id.as_deref(), Some("abc123"));
        assert_eq!(platform.sent_to(Destination::Channel(1)), vec!["live at abc123"]);
        assert_eq!(platform.sent_to(Destination::Channel(2)), vec!["<@&77> live at abc123"]);
        assert!(platform.sent_to(Destination::Channel(3)).is_empty());

        assert_eq!(notifier.handle(live("abc123")).await, 0);
        assert_eq!(platform.total_sent(), 2);
    }

    #[tokio::test]
    async fn test_changed_id_is_stored_silently() {
        let (notifier, store, platform) = setup().await;

        notifier.handle(live("first")).await;
        assert_eq!(notifier.handle(live("second")).await, 0);
        assert_eq!(store.live().await.broadcast_id.as_deref(), Some("second"));
        assert_eq!(platform.total_sent(), 2);
    }

    #[tokio::test]
    async fn test_offline_clears_and_next_live_notifies() {
        let (notifier, store, platform) = setup().await;

        notifier.handle(live("a")).await;
        assert_eq!(notifier.handle(offline()).await, 0);
        assert!(store.live().await.broadcast_id.is_none());
        assert_eq!(notifier.handle(offline()).await, 0);

        assert_eq!(notifier.handle(live("b")).await, 2);
        assert_eq!(platform.total_sent(), 4);
    }

    #[tokio::test]
    async fn test_run_consumes_signals() {
        let (notifier, _store, platform) = setup().await;
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        signal_tx.send(live("x")).unwrap();
        signal_tx.send(live("x")).unwrap();
        drop(signal_tx);
        notifier.run(signal_rx, shutdown_rx).await;

        assert_eq!(platform.total_sent(), 2);
    }
}

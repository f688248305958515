//! Relay engine that ties DGG chat and Discord together.
//!
//! Every flush interval the engine drains the inbound queue, routes each
//! message through the subscription tables, chunks the rendered lines per
//! destination and hands them to the platform. Sends run in the background;
//! their results are collected at the start of the next cycle.

use std::sync::Arc;
use std::time::Duration;

use serenity::async_trait;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::bridge::delivery::PendingDeliveryQueue;
use crate::bridge::presence::PresenceTracker;
use crate::bridge::queue::InboundQueue;
use crate::bridge::renderer::TextRenderer;
use crate::bridge::subscriptions::{SubscriptionStore, Subscriptions};
use crate::common::error::{DiscordError, DiscordResult};
use crate::common::{ChatMessage, Destination, DestinationHandle};

/// Where relayed text ends up.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Look up a destination. `None` if it no longer exists or is unreachable.
    async fn resolve(&self, destination: Destination) -> Option<DestinationHandle>;

    /// Post one message.
    async fn send(&self, handle: &DestinationHandle, text: String) -> DiscordResult<()>;
}

/// Result of one background delivery task.
#[derive(Debug)]
struct DeliveryOutcome {
    destination: Destination,
    sent: usize,
    failures: Vec<DiscordError>,
}

/// Summary of a relay cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub messages: usize,
    pub destinations: usize,
    pub chunks: usize,
    pub withheld: usize,
}

/// The routing and delivery engine.
pub struct RelayEngine<P: Platform> {
    store: Arc<SubscriptionStore>,
    presence: PresenceTracker,
    queue: InboundQueue,
    platform: Arc<P>,
    renderer: TextRenderer,
    max_message_len: usize,
    in_flight: JoinSet<DeliveryOutcome>,
}

impl<P: Platform> RelayEngine<P> {
    pub fn new(
        store: Arc<SubscriptionStore>,
        presence: PresenceTracker,
        queue: InboundQueue,
        platform: Arc<P>,
        max_message_len: usize,
    ) -> Self {
        Self {
            store,
            presence,
            queue,
            platform,
            renderer: TextRenderer::new(),
            max_message_len,
            in_flight: JoinSet::new(),
        }
    }

    /// Run cycles every `interval` until shutdown, then flush what is left.
    pub async fn run(mut self, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Relay engine started (flush every {:?})", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Relay engine stopping, flushing pending messages");
        self.run_cycle().await;
        self.flush_in_flight().await;
    }

    /// Drain the queue, route and dispatch. An empty queue is a no-op.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.reap_finished();

        let batch = self.queue.drain_all();
        if batch.is_empty() {
            return CycleReport::default();
        }

        let pending = self.route(&batch).await;
        let mut report = self.dispatch(pending).await;
        report.messages = batch.len();

        debug!(
            messages = report.messages,
            destinations = report.destinations,
            chunks = report.chunks,
            withheld = report.withheld,
            "Relay cycle dispatched"
        );
        report
    }

    /// Wait for every in-flight send to finish.
    pub async fn flush_in_flight(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            log_outcome(joined);
        }
    }

    /// Build the per-destination chunks for a batch. Holds the store's read lock.
    async fn route(&self, batch: &[ChatMessage]) -> PendingDeliveryQueue {
        let subscriptions = self.store.read().await;
        let mut pending = PendingDeliveryQueue::new(self.max_message_len);

        for message in batch {
            let channels = subscriptions.relays_for(&message.sender);
            let users = self.phrase_recipients(&subscriptions, message);
            if channels.is_empty() && users.is_empty() {
                continue;
            }

            let line = self
                .renderer
                .render_line(&message.sender, &message.text, &subscriptions.emotes);

            for channel in channels {
                debug!("Relaying message from {} to channel {}", message.sender, channel);
                pending.push(Destination::Channel(channel), &line.text, line.sensitive);
            }
            for user in users {
                debug!("Forwarding phrase match from {} to user {}", message.sender, user);
                pending.push(Destination::User(user), &line.text, line.sensitive);
            }
        }

        pending
    }

    /// Subscribers to notify about a message, once each.
    fn phrase_recipients(&self, subscriptions: &Subscriptions, message: &ChatMessage) -> Vec<u64> {
        let sender = message.sender.to_lowercase();
        let mut users: Vec<u64> = Vec::new();

        for (phrase, user) in subscriptions.subscribers_matching(&message.text) {
            if users.contains(&user) {
                continue;
            }
            if let Some(prefs) = subscriptions.user_prefs.get(&user) {
                if prefs.detect_presence && self.presence.is_present(&phrase) {
                    debug!("'{}' is in chat, not notifying user {}", phrase, user);
                    continue;
                }
                if prefs.ignores.contains(&sender) {
                    debug!("User {} ignores {}", user, message.sender);
                    continue;
                }
            }
            users.push(user);
        }

        users
    }

    /// Resolve destinations and spawn one sequential send task per destination.
    async fn dispatch(&mut self, pending: PendingDeliveryQueue) -> CycleReport {
        let mut report = CycleReport::default();

        for (destination, chunks) in pending.into_inner() {
            let Some(handle) = self.platform.resolve(destination).await else {
                warn!("Could not resolve {}, dropping {} chunk(s)", destination, chunks.len());
                continue;
            };

            let mut texts = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                if chunk.sensitive && !handle.allows_sensitive {
                    debug!("Withholding sensitive content from {}", destination);
                    report.withheld += 1;
                    continue;
                }
                texts.push(chunk.text);
            }
            if texts.is_empty() {
                continue;
            }

            report.destinations += 1;
            report.chunks += texts.len();

            let platform = Arc::clone(&self.platform);
            self.in_flight.spawn(async move {
                let mut outcome = DeliveryOutcome {
                    destination: handle.destination,
                    sent: 0,
                    failures: Vec::new(),
                };
                for text in texts {
                    match platform.send(&handle, text).await {
                        Ok(()) => outcome.sent += 1,
                        Err(e) => outcome.failures.push(e),
                    }
                }
                outcome
            });
        }

        report
    }

    /// Collect sends that completed since the last cycle.
    fn reap_finished(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            log_outcome(joined);
        }
    }
}

fn log_outcome(joined: Result<DeliveryOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => {
            for failure in &outcome.failures {
                warn!("Delivery to {} failed: {}", outcome.destination, failure);
            }
            debug!("Delivered {} message(s) to {}", outcome.sent, outcome.destination);
        }
        Err(e) => warn!("Delivery task panicked: {}", e),
    }
}

//! Bridge channel management.
//!
//! Provides communication channel structures for the bridge,
//! grouping related channels for the DGG clients, Discord and shutdown.

use tokio::sync::{mpsc, watch};

use crate::common::{DggCommand, LiveSignal, Whisper};

/// Channels for the DGG chat client.
pub struct DggChannels {
    /// Receiver for outbound chat commands (Discord -> DGG).
    pub command_rx: mpsc::UnboundedReceiver<DggCommand>,
    /// Sender for whispers received from DGG.
    pub whisper_tx: mpsc::UnboundedSender<Whisper>,
    /// Receiver for shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels for the DGG live feed and the notifier it drives.
pub struct LiveChannels {
    /// Sender for broadcast status (live client sends).
    pub signal_tx: mpsc::UnboundedSender<LiveSignal>,
    /// Receiver for broadcast status (notifier listens).
    pub signal_rx: mpsc::UnboundedReceiver<LiveSignal>,
}

/// Channels for the Discord handler.
pub struct DiscordSideChannels {
    /// Sender for outbound chat commands (owner commands and replies).
    pub command_tx: mpsc::UnboundedSender<DggCommand>,
    /// Receiver for whispers to forward to the owner.
    pub whisper_rx: mpsc::UnboundedReceiver<Whisper>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels created by the bridge.
pub struct ChannelBundle {
    pub dgg: DggChannels,
    pub live: LiveChannels,
    pub discord: DiscordSideChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    /// Create a new set of bridge channels.
    pub fn new() -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (whisper_tx, whisper_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            dgg: DggChannels {
                command_rx,
                whisper_tx,
                shutdown_rx,
            },
            live: LiveChannels { signal_tx, signal_rx },
            discord: DiscordSideChannels {
                command_tx,
                whisper_rx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bundle_is_wired() {
        let mut bundle = ChannelBundle::new();

        bundle
            .discord
            .command_tx
            .send(DggCommand::Send { text: "hi".to_string() })
            .unwrap();
        assert_eq!(
            bundle.dgg.command_rx.recv().await,
            Some(DggCommand::Send { text: "hi".to_string() })
        );

        bundle.control.shutdown_tx.send(true).unwrap();
        assert!(*bundle.dgg.shutdown_rx.borrow_and_update());
    }
}

//! dgg-relay - DGG chat to Discord relay bot
//!
//! Watches destiny.gg chat and forwards messages from selected users to
//! Discord channels, phrase mentions to subscribers' DMs, and "went live"
//! notifications to opted-in servers.

mod bridge;
mod common;
mod config;
mod dgg;
mod discord;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{debug, error, info, warn};

use bridge::persist::{load_subscriptions, JsonFileSaveHook};
use bridge::{ChannelBundle, InboundQueue, LiveNotifier, PresenceTracker, RelayEngine, SubscriptionStore};
use common::logging::init_logging;
use config::{env::get_config_path, load_and_validate};
use dgg::{DggClient, LiveClient};
use discord::{build_http, DiscordBotBuilder, DiscordPlatform};

#[tokio::main]
async fn main() -> Result<()> {
    let log_handle = init_logging();

    info!("dgg-relay v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  DGG chat: {}", config.dgg.chat_url);
    info!("  DGG live feed: {}", config.dgg.live_url);
    info!("  Relay channel: #{}", config.discord.relay_channel);
    info!("  Flush interval: {}s", config.relay.flush_interval_secs);
    if config.dgg.auth_token.is_none() {
        warn!("No DGG auth token configured, the bot will not be able to post to DGG");
    }

    // Load subscriptions
    let subscriptions_path = Path::new(&config.relay.subscriptions_path);
    let subscriptions = load_subscriptions(subscriptions_path)?;
    let store = Arc::new(SubscriptionStore::new(
        subscriptions,
        Box::new(JsonFileSaveHook::new(subscriptions_path)),
    ));

    // ============================================================
    // Create channels and shared state
    // ============================================================
    let channels = ChannelBundle::new();
    let queue = InboundQueue::new();
    let presence = PresenceTracker::new();
    let shutdown_tx = channels.control.shutdown_tx;
    let shutdown_rx = channels.dgg.shutdown_rx.clone();

    let platform = Arc::new(DiscordPlatform::new(Arc::new(build_http(&config.discord.token)?)));

    let discord_bot = DiscordBotBuilder::new(
        config.discord.clone(),
        channels.discord,
        store.clone(),
        platform.clone(),
        shutdown_rx.clone(),
    )
    .log_handle(log_handle)
    .build()
    .await?;

    // ============================================================
    // Spawn tasks
    // ============================================================
    info!("Starting Discord bot...");
    let discord_task = tokio::spawn(discord_bot.run());

    let dgg_client = DggClient::new(config.dgg.clone(), queue.clone(), presence.clone(), channels.dgg);
    let dgg_task = tokio::spawn(dgg_client.run_forever());

    let live_client = LiveClient::new(
        config.dgg.live_url.clone(),
        channels.live.signal_tx,
        shutdown_rx.clone(),
    );
    let live_task = tokio::spawn(live_client.run_forever());

    let notifier = LiveNotifier::new(store.clone(), platform.clone(), config.live.message.clone());
    let notifier_task = tokio::spawn(notifier.run(channels.live.signal_rx, shutdown_rx.clone()));

    let engine = RelayEngine::new(
        store,
        presence,
        queue,
        platform,
        config.relay.max_message_len,
    );
    let mut engine_task = tokio::spawn(engine.run(
        Duration::from_secs(config.relay.flush_interval_secs),
        shutdown_rx,
    ));

    // ============================================================
    // Run until a signal or a task exits
    // ============================================================
    tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - flushing and disconnecting...");
        }
        _ = &mut engine_task => error!("Relay engine exited unexpectedly"),
        _ = discord_task => error!("Discord task exited unexpectedly"),
        _ = dgg_task => error!("DGG chat task exited unexpectedly"),
        _ = live_task => error!("DGG live feed task exited unexpectedly"),
        _ = notifier_task => error!("Live notifier exited unexpectedly"),
    }

    if let Err(e) = shutdown_tx.send(true) {
        debug!("Shutdown channel closed (tasks already exited): {}", e);
    }

    // Let the engine post what is still queued
    if !engine_task.is_finished() {
        let timeout = Duration::from_secs(10);
        match tokio::time::timeout(timeout, engine_task).await {
            Ok(Ok(())) => info!("Relay engine flushed"),
            Ok(Err(e)) => warn!("Relay engine task panicked: {}", e),
            Err(_) => warn!("Relay engine flush timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

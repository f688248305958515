//! Configuration type definitions.

use serde::Deserialize;

/// Default period between relay flushes, in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Discord's message length limit, counted in characters.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 2000;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    pub dgg: DggConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub live: LiveConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// User allowed to run owner commands and receive forwarded whispers.
    pub owner_id: u64,
    /// Name of the channel relays and live notifications are posted to.
    #[serde(default = "default_relay_channel")]
    pub relay_channel: String,
    /// Role required to manage relays in a server.
    #[serde(default = "default_mod_role")]
    pub mod_role: String,
}

/// DGG chat connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DggConfig {
    /// Value of the `authtoken` cookie. Without it the bot can read but not post.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default = "default_live_url")]
    pub live_url: String,
}

/// Routing engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_subscriptions_path")]
    pub subscriptions_path: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            subscriptions_path: default_subscriptions_path(),
        }
    }
}

/// Live notification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Notification text. `%id` is replaced with the broadcast id.
    #[serde(default = "default_live_message")]
    pub message: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            message: default_live_message(),
        }
    }
}

fn default_relay_channel() -> String {
    "dgg-relay".to_string()
}

fn default_mod_role() -> String {
    "dgg-relay-mod".to_string()
}

fn default_chat_url() -> String {
    "wss://chat.destiny.gg/ws".to_string()
}

fn default_live_url() -> String {
    "wss://live.destiny.gg/".to_string()
}

fn default_flush_interval() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

fn default_max_message_len() -> usize {
    DEFAULT_MAX_MESSAGE_LEN
}

fn default_subscriptions_path() -> String {
    "subscriptions.json".to_string()
}

fn default_live_message() -> String {
    "Destiny is live! https://youtu.be/%id".to_string()
}

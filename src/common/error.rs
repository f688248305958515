//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Subscription store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to save subscriptions to '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode subscriptions: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// DGG chat transport errors.
#[derive(Debug, Error)]
pub enum DggError {
    #[error("Websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid auth token header: {0}")]
    InvalidHeader(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Outbound channel closed")]
    ChannelClosed,
}

/// Discord-related errors.
#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("Failed to send message to {destination}: {source}")]
    SendFailed {
        destination: String,
        #[source]
        source: serenity::Error,
    },

    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
}

/// Errors surfaced to the user by the command layer.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("This command is only usable in servers")]
    GuildOnly,

    #[error("No '#{0}' channel found in this server")]
    NoRelayChannel(String),

    #[error("This command requires the '{0}' role")]
    MissingRole(String),

    #[error("Only my owner can use the {0} command")]
    OwnerOnly(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("Unknown log level '{0}' (expected warn, info or debug)")]
    InvalidLogLevel(String),

    #[error("Failed to change log level: {0}")]
    LogReload(String),

    #[error("Not connected to DGG chat")]
    DggUnavailable,

    #[error("Could not save the change: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for Discord operations.
pub type DiscordResult<T> = std::result::Result<T, DiscordError>;

/// Result type alias for command handling.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

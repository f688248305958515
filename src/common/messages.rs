//! Canonical message types for relay communication.
//!
//! This module defines the single source of truth for the types that flow
//! between the DGG transport, the relay engine and Discord.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message received from DGG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender's DGG nick.
    pub sender: String,
    /// Raw message text.
    pub text: String,
    /// Time the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A whisper (private message) received from DGG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whisper {
    pub sender: String,
    pub text: String,
}

/// Outbound request from Discord to DGG chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DggCommand {
    /// Post a message in chat.
    Send { text: String },
    /// Whisper a user.
    Whisper { nick: String, text: String },
}

/// Broadcast status reported by the live feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSignal {
    pub live: bool,
    pub broadcast_id: Option<String>,
}

/// A Discord target that can receive relayed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Destination {
    /// A guild text channel.
    Channel(u64),
    /// A user, reached through their DM channel.
    User(u64),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Channel(id) => write!(f, "channel {}", id),
            Destination::User(id) => write!(f, "user {}", id),
        }
    }
}

/// A resolved destination, ready to receive messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationHandle {
    /// The destination this handle was resolved from.
    pub destination: Destination,
    /// The Discord channel messages are posted to (DM channel for users).
    pub channel_id: u64,
    /// Whether the destination may receive nsfw/nsfl tagged content.
    pub allows_sensitive: bool,
}

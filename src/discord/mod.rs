//! Discord bot integration.
//!
//! This module provides the Discord side of the relay: the gateway client,
//! the `!` command layer and the `Platform` used for delivery.

pub mod client;
pub mod commands;
pub mod handler;
pub mod platform;

// Re-export main types for external use
pub use client::{build_http, DiscordBotBuilder};
pub use platform::DiscordPlatform;

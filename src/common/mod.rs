//! Common utilities and types shared across the application.

pub mod error;
pub mod logging;
pub mod messages;
pub mod reconnect;

// Re-export message types from messages module
pub use messages::{
    ChatMessage, DestinationHandle, Destination, DggCommand, LiveSignal, Whisper,
};

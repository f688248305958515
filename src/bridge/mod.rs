//! Relay core: rendering, subscriptions, routing and delivery.
//!
//! ## Module Structure
//!
//! - `renderer`: DGG -> Discord text rendering
//! - `subscriptions`: Routing tables and the store guarding them
//! - `persist`: JSON save hook for the store
//! - `presence`: DGG chat roster
//! - `queue`: Batching inbound queue
//! - `delivery`: Per-destination chunking
//! - `orchestrator`: The relay engine (`RelayEngine`) and `Platform` trait
//! - `live`: Live-status notifier
//! - `channels`: Communication channel structures

pub mod channels;
pub mod delivery;
pub mod live;
pub mod orchestrator;
pub mod persist;
pub mod presence;
pub mod queue;
pub mod renderer;
pub mod subscriptions;

// Re-export main types for convenience
pub use channels::ChannelBundle;
pub use live::LiveNotifier;
pub use orchestrator::{Platform, RelayEngine};
pub use presence::PresenceTracker;
pub use queue::InboundQueue;
pub use subscriptions::{Mutation, SubscriptionStore};

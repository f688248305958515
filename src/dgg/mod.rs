//! DGG chat and live feed clients.

pub mod client;
pub mod live;
pub mod protocol;

pub use client::DggClient;
pub use live::LiveClient;

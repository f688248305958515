//! Discord as a relay destination.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::Channel;
use serenity::model::id::{ChannelId, UserId};
use tracing::{debug, warn};

use crate::bridge::Platform;
use crate::common::error::{DiscordError, DiscordResult};
use crate::common::{Destination, DestinationHandle};

/// Channel lookups older than this are fetched again, so nsfw changes are
/// picked up.
const CHANNEL_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
struct CachedChannel {
    channel_id: u64,
    allows_sensitive: bool,
    fetched_at: Instant,
}

impl CachedChannel {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < CHANNEL_TTL
    }
}

/// Resolves channels and DMs over the REST API and posts to them.
pub struct DiscordPlatform {
    http: Arc<Http>,
    channels: Mutex<HashMap<u64, CachedChannel>>,
    /// DM channels never change once opened.
    dm_channels: Mutex<HashMap<u64, u64>>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: Mutex::new(HashMap::new()),
            dm_channels: Mutex::new(HashMap::new()),
        }
    }

    async fn resolve_channel(&self, id: u64) -> Option<DestinationHandle> {
        let cached = self
            .channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .copied()
            .filter(|channel| channel.is_fresh(Instant::now()));

        let channel = match cached {
            Some(channel) => channel,
            None => {
                let channel = self.fetch_channel(id).await?;
                self.channels
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(id, channel);
                channel
            }
        };

        Some(DestinationHandle {
            destination: Destination::Channel(id),
            channel_id: channel.channel_id,
            allows_sensitive: channel.allows_sensitive,
        })
    }

    async fn fetch_channel(&self, id: u64) -> Option<CachedChannel> {
        let (channel_id, allows_sensitive) = match self.http.get_channel(ChannelId::new(id)).await {
            Ok(Channel::Guild(channel)) => (id, channel.nsfw),
            Ok(Channel::Private(channel)) => (channel.id.get(), true),
            Ok(other) => {
                debug!("Channel {} has unsupported type {:?}", id, other);
                return None;
            }
            Err(e) => {
                warn!("Failed to look up channel {}: {}", id, e);
                return None;
            }
        };

        Some(CachedChannel {
            channel_id,
            allows_sensitive,
            fetched_at: Instant::now(),
        })
    }

    async fn resolve_user(&self, id: u64) -> Option<DestinationHandle> {
        let cached = self
            .dm_channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .copied();

        let channel_id = match cached {
            Some(channel_id) => channel_id,
            None => match UserId::new(id).create_dm_channel(self.http.as_ref()).await {
                Ok(channel) => {
                    let channel_id = channel.id.get();
                    self.dm_channels
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(id, channel_id);
                    channel_id
                }
                Err(e) => {
                    warn!("Failed to open a DM with user {}: {}", id, e);
                    return None;
                }
            },
        };

        Some(DestinationHandle {
            destination: Destination::User(id),
            channel_id,
            allows_sensitive: true,
        })
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn resolve(&self, destination: Destination) -> Option<DestinationHandle> {
        if destination_id(destination) == 0 {
            return None;
        }
        match destination {
            Destination::Channel(id) => self.resolve_channel(id).await,
            Destination::User(id) => self.resolve_user(id).await,
        }
    }

    async fn send(&self, handle: &DestinationHandle, text: String) -> DiscordResult<()> {
        ChannelId::new(handle.channel_id)
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|source| DiscordError::SendFailed {
                destination: handle.destination.to_string(),
                source,
            })
    }
}

/// Snowflakes are never zero; `ChannelId::new(0)` would panic.
fn destination_id(destination: Destination) -> u64 {
    match destination {
        Destination::Channel(id) | Destination::User(id) => id,
    }
}

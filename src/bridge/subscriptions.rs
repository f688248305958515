//! Subscription tables and the store that guards them.
//!
//! All routing state lives in [`Subscriptions`]. The command layer, the relay
//! engine and the live notifier share one [`SubscriptionStore`] and only change
//! the tables through its operations. Every applied change is handed to the
//! store's [`SaveHook`] before the operation returns.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::bridge::renderer::{is_word_char, EmoteMap};
use crate::common::error::{StoreError, StoreResult};

/// Outcome of a store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The tables changed and were saved.
    Applied,
    /// The request was a no-op (already present, or nothing to remove).
    Unchanged,
}

impl Mutation {
    pub fn is_applied(self) -> bool {
        self == Mutation::Applied
    }

    fn from_bool(changed: bool) -> Self {
        if changed {
            Mutation::Applied
        } else {
            Mutation::Unchanged
        }
    }
}

/// Per-subscriber preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    /// Skip phrase notifications while the watched name is in DGG chat.
    #[serde(default)]
    pub detect_presence: bool,
    /// Lowercased DGG nicks whose messages are never forwarded to this user.
    #[serde(default)]
    pub ignores: BTreeSet<String>,
}

/// Live notification settings for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveChannel {
    pub enabled: bool,
    /// Role mentioned in the notification.
    #[serde(default)]
    pub role: Option<u64>,
}

/// Current broadcast and per-channel notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveState {
    /// Id of the broadcast in progress, `None` while offline.
    #[serde(default)]
    pub broadcast_id: Option<String>,
    #[serde(default)]
    pub channels: BTreeMap<u64, LiveChannel>,
}

/// The routing tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriptions {
    /// DGG nick -> channel ids, in insertion order.
    #[serde(default)]
    pub relays: BTreeMap<String, Vec<u64>>,
    /// Phrase -> subscriber user ids, in insertion order.
    #[serde(default)]
    pub phrases: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    pub user_prefs: BTreeMap<u64, UserPreference>,
    #[serde(default)]
    pub emotes: EmoteMap,
    #[serde(default)]
    pub live: LiveState,
}

impl Subscriptions {
    /// Channels relaying messages from `sender`, across every case variant of the nick.
    pub fn relays_for(&self, sender: &str) -> Vec<u64> {
        let sender = sender.to_lowercase();
        let mut channels = Vec::new();
        for (user, ids) in &self.relays {
            if user.to_lowercase() != sender {
                continue;
            }
            for id in ids {
                if !channels.contains(id) {
                    channels.push(*id);
                }
            }
        }
        channels
    }

    /// Every (phrase, subscriber) pair whose phrase appears in `text` as a whole word.
    pub fn subscribers_matching(&self, text: &str) -> Vec<(String, u64)> {
        let haystack = text.to_lowercase();
        self.phrases
            .iter()
            .filter(|(phrase, _)| contains_word(&haystack, &phrase.to_lowercase()))
            .flat_map(|(phrase, users)| users.iter().map(move |user| (phrase.clone(), *user)))
            .collect()
    }

    /// Preferences for a user, or the defaults if they never set any.
    pub fn preference(&self, user: u64) -> UserPreference {
        self.user_prefs.get(&user).cloned().unwrap_or_default()
    }

    /// DGG nicks relayed to a channel.
    pub fn relays_for_channel(&self, channel: u64) -> Vec<String> {
        self.relays
            .iter()
            .filter(|(_, ids)| ids.contains(&channel))
            .map(|(user, _)| user.clone())
            .collect()
    }

    /// Phrases a user is subscribed to.
    pub fn phrases_for_user(&self, user: u64) -> Vec<String> {
        self.phrases
            .iter()
            .filter(|(_, ids)| ids.contains(&user))
            .map(|(phrase, _)| phrase.clone())
            .collect()
    }

    /// Channels with live notifications enabled, with their role.
    pub fn live_targets(&self) -> Vec<(u64, Option<u64>)> {
        self.live
            .channels
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(channel, settings)| (*channel, settings.role))
            .collect()
    }
}

/// Returns true if `needle` occurs in `haystack` with no word character on either side.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Find the key in `map` that matches `name` ignoring case.
fn find_key<V>(map: &BTreeMap<String, V>, name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    map.keys().find(|key| key.to_lowercase() == lower).cloned()
}

/// Add `id` to the list under `key`, creating it if needed.
fn insert_into(map: &mut BTreeMap<String, Vec<u64>>, key: &str, id: u64) -> bool {
    let key = find_key(map, key).unwrap_or_else(|| key.to_string());
    let ids = map.entry(key).or_default();
    if ids.contains(&id) {
        false
    } else {
        ids.push(id);
        true
    }
}

/// Remove `id` from the list under `key`, pruning the key once empty.
fn remove_from(map: &mut BTreeMap<String, Vec<u64>>, key: &str, id: u64) -> bool {
    let Some(key) = find_key(map, key) else {
        return false;
    };
    let Some(ids) = map.get_mut(&key) else {
        return false;
    };
    let before = ids.len();
    ids.retain(|existing| *existing != id);
    let changed = ids.len() != before;
    if ids.is_empty() {
        map.remove(&key);
    }
    changed
}

/// Receives the tables after every applied mutation.
pub trait SaveHook: Send + Sync {
    fn save(&self, subscriptions: &Subscriptions) -> StoreResult<()>;
}

/// A hook that keeps changes in memory only.
#[cfg(test)]
pub struct NoopSaveHook;

#[cfg(test)]
impl SaveHook for NoopSaveHook {
    fn save(&self, _subscriptions: &Subscriptions) -> StoreResult<()> {
        Ok(())
    }
}

/// Shared, lock-guarded subscription tables.
pub struct SubscriptionStore {
    inner: RwLock<Subscriptions>,
    hook: Box<dyn SaveHook>,
}

impl SubscriptionStore {
    pub fn new(subscriptions: Subscriptions, hook: Box<dyn SaveHook>) -> Self {
        Self {
            inner: RwLock::new(subscriptions),
            hook,
        }
    }

    /// Read access to the tables. Do not hold the guard across an await.
    pub async fn read(&self) -> RwLockReadGuard<'_, Subscriptions> {
        self.inner.read().await
    }

    /// Apply a change under the write lock and save it if anything changed.
    async fn mutate<F>(&self, what: &str, f: F) -> StoreResult<Mutation>
    where
        F: FnOnce(&mut Subscriptions) -> bool,
    {
        let mut subscriptions = self.inner.write().await;
        let outcome = Mutation::from_bool(f(&mut subscriptions));
        if outcome.is_applied() {
            self.hook.save(&subscriptions)?;
            info!("Subscriptions updated: {}", what);
        } else {
            debug!("Subscriptions unchanged: {}", what);
        }
        Ok(outcome)
    }

    pub async fn add_relay(&self, user: &str, channel: u64) -> StoreResult<Mutation> {
        let user = validate_name("dgg user", user)?;
        self.mutate(&format!("relay {} -> {}", user, channel), |s| {
            insert_into(&mut s.relays, user, channel)
        })
        .await
    }

    pub async fn remove_relay(&self, user: &str, channel: u64) -> StoreResult<Mutation> {
        self.mutate(&format!("unrelay {} -> {}", user, channel), |s| {
            remove_from(&mut s.relays, user, channel)
        })
        .await
    }

    /// Drop a relay key entirely, whatever channels it pointed at.
    pub async fn purge_relay(&self, user: &str) -> StoreResult<Mutation> {
        self.mutate(&format!("purge relay {}", user), |s| {
            find_key(&s.relays, user).is_some_and(|key| s.relays.remove(&key).is_some())
        })
        .await
    }

    pub async fn add_phrase(&self, phrase: &str, subscriber: u64) -> StoreResult<Mutation> {
        let phrase = validate_name("phrase", phrase)?;
        self.mutate(&format!("phrase '{}' -> {}", phrase, subscriber), |s| {
            insert_into(&mut s.phrases, phrase, subscriber)
        })
        .await
    }

    pub async fn remove_phrase(&self, phrase: &str, subscriber: u64) -> StoreResult<Mutation> {
        self.mutate(&format!("unphrase '{}' -> {}", phrase, subscriber), |s| {
            remove_from(&mut s.phrases, phrase, subscriber)
        })
        .await
    }

    /// Drop a phrase entirely, for every subscriber.
    pub async fn purge_phrase(&self, phrase: &str) -> StoreResult<Mutation> {
        self.mutate(&format!("purge phrase '{}'", phrase), |s| {
            find_key(&s.phrases, phrase).is_some_and(|key| s.phrases.remove(&key).is_some())
        })
        .await
    }

    /// Create default preferences for a user who has none yet.
    pub async fn ensure_preference(&self, user: u64) -> StoreResult<Mutation> {
        self.mutate(&format!("new preferences for {}", user), |s| {
            if s.user_prefs.contains_key(&user) {
                false
            } else {
                s.user_prefs.insert(user, UserPreference::default());
                true
            }
        })
        .await
    }

    pub async fn set_detect_presence(&self, user: u64, enabled: bool) -> StoreResult<Mutation> {
        self.mutate(&format!("detect_presence={} for {}", enabled, user), |s| {
            if s.preference(user).detect_presence == enabled {
                return false;
            }
            s.user_prefs.entry(user).or_default().detect_presence = enabled;
            true
        })
        .await
    }

    pub async fn add_ignore(&self, user: u64, nick: &str) -> StoreResult<Mutation> {
        let nick = validate_name("dgg user", nick)?.to_lowercase();
        self.mutate(&format!("{} ignores {}", user, nick), |s| {
            if s.preference(user).ignores.contains(&nick) {
                return false;
            }
            s.user_prefs.entry(user).or_default().ignores.insert(nick.clone())
        })
        .await
    }

    pub async fn remove_ignore(&self, user: u64, nick: &str) -> StoreResult<Mutation> {
        let nick = nick.trim().to_lowercase();
        self.mutate(&format!("{} unignores {}", user, nick), |s| {
            s.user_prefs
                .get_mut(&user)
                .is_some_and(|prefs| prefs.ignores.remove(&nick))
        })
        .await
    }

    pub async fn add_emote(&self, token: &str, replacement: &str) -> StoreResult<Mutation> {
        let token = validate_name("emote", token)?;
        let replacement = validate_name("discord emote", replacement)?;
        self.mutate(&format!("emote {} -> {}", token, replacement), |s| {
            if s.emotes.get(token).map(String::as_str) == Some(replacement) {
                false
            } else {
                s.emotes.insert(token.to_string(), replacement.to_string());
                true
            }
        })
        .await
    }

    pub async fn remove_emote(&self, token: &str) -> StoreResult<Mutation> {
        self.mutate(&format!("remove emote {}", token), |s| {
            s.emotes.shift_remove(token.trim()).is_some()
        })
        .await
    }

    pub async fn set_live_enabled(&self, channel: u64, enabled: bool) -> StoreResult<Mutation> {
        self.mutate(&format!("live notifications={} in {}", enabled, channel), |s| {
            if s.live.channels.get(&channel).map_or(false, |c| c.enabled) == enabled {
                return false;
            }
            s.live.channels.entry(channel).or_default().enabled = enabled;
            true
        })
        .await
    }

    pub async fn set_live_role(&self, channel: u64, role: Option<u64>) -> StoreResult<Mutation> {
        self.mutate(&format!("live role={:?} in {}", role, channel), |s| {
            if s.live.channels.get(&channel).and_then(|c| c.role) == role {
                return false;
            }
            s.live.channels.entry(channel).or_default().role = role;
            true
        })
        .await
    }

    /// Record the broadcast in progress (`None` when offline).
    pub async fn set_broadcast(&self, broadcast_id: Option<String>) -> StoreResult<Mutation> {
        self.mutate(&format!("broadcast id={:?}", broadcast_id), |s| {
            let changed = s.live.broadcast_id != broadcast_id;
            s.live.broadcast_id = broadcast_id;
            changed
        })
        .await
    }

    pub async fn relays_for(&self, sender: &str) -> Vec<u64> {
        self.read().await.relays_for(sender)
    }

    pub async fn subscribers_matching(&self, text: &str) -> Vec<(String, u64)> {
        self.read().await.subscribers_matching(text)
    }

    pub async fn relays_for_channel(&self, channel: u64) -> Vec<String> {
        self.read().await.relays_for_channel(channel)
    }

    pub async fn phrases_for_user(&self, user: u64) -> Vec<String> {
        self.read().await.phrases_for_user(user)
    }

    pub async fn emotes(&self) -> EmoteMap {
        self.read().await.emotes.clone()
    }

    pub async fn live(&self) -> LiveState {
        self.read().await.live.clone()
    }
}

/// Reject blank names so no table ever gets an empty key.
fn validate_name<'a>(field: &'static str, value: &'a str) -> StoreResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::InvalidValue {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts saves and can be told to fail.
    #[derive(Default)]
    struct CountingHook {
        saves: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SaveHook for CountingHook {
        fn save(&self, _subscriptions: &Subscriptions) -> StoreResult<()> {
            if self.fail {
                return Err(StoreError::Persist {
                    path: "test".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn store_with_counter() -> (SubscriptionStore, Arc<AtomicUsize>) {
        let saves = Arc::new(AtomicUsize::new(0));
        let hook = CountingHook {
            saves: saves.clone(),
            fail: false,
        };
        (SubscriptionStore::new(Subscriptions::default(), Box::new(hook)), saves)
    }

    #[tokio::test]
    async fn test_add_relay_is_idempotent() {
        let (store, saves) = store_with_counter();

        assert_eq!(store.add_relay("alice", 7).await.unwrap(), Mutation::Applied);
        assert_eq!(store.add_relay("alice", 7).await.unwrap(), Mutation::Unchanged);
        assert_eq!(store.relays_for("alice").await, vec![7]);
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_relay_prunes_empty_key() {
        let (store, saves) = store_with_counter();

        store.add_relay("alice", 7).await.unwrap();
        store.add_relay("alice", 8).await.unwrap();
        assert_eq!(store.remove_relay("alice", 7).await.unwrap(), Mutation::Applied);
        assert!(store.read().await.relays.contains_key("alice"));
        assert_eq!(store.remove_relay("alice", 8).await.unwrap(), Mutation::Applied);
        assert!(store.read().await.relays.is_empty());
        assert_eq!(store.remove_relay("alice", 8).await.unwrap(), Mutation::Unchanged);
        assert_eq!(saves.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_relay_lookup_ignores_case() {
        let (store, _) = store_with_counter();

        store.add_relay("Alice", 1).await.unwrap();
        store.add_relay("alice", 2).await.unwrap();
        // both adds land under the existing key
        assert_eq!(store.read().await.relays.len(), 1);
        assert_eq!(store.relays_for("ALICE").await, vec![1, 2]);

        store.remove_relay("ALICE", 1).await.unwrap();
        assert_eq!(store.relays_for("alice").await, vec![2]);
    }

    #[tokio::test]
    async fn test_relay_lookup_unions_loaded_case_variants() {
        let mut subs = Subscriptions::default();
        subs.relays.insert("Bob".to_string(), vec![1, 2]);
        subs.relays.insert("bob".to_string(), vec![2, 3]);
        let store = SubscriptionStore::new(subs, Box::new(NoopSaveHook));

        assert_eq!(store.relays_for("bob").await, vec![1, 2, 3]);
        assert!(store.relays_for("carol").await.is_empty());
    }

    #[tokio::test]
    async fn test_add_then_remove_leaves_no_empty_entries() {
        let (store, _) = store_with_counter();

        for user in ["a", "b", "c"] {
            store.add_relay(user, 1).await.unwrap();
            store.add_phrase(user, 10).await.unwrap();
        }
        for user in ["a", "b", "c"] {
            store.remove_relay(user, 1).await.unwrap();
            store.remove_phrase(user, 10).await.unwrap();
        }

        let subs = store.read().await;
        assert!(subs.relays.is_empty());
        assert!(subs.phrases.is_empty());
    }

    #[tokio::test]
    async fn test_phrase_matching_is_whole_word_and_case_insensitive() {
        let (store, _) = store_with_counter();

        store.add_phrase("bob", 10).await.unwrap();
        store.add_phrase("bob", 11).await.unwrap();
        store.add_phrase("big news", 12).await.unwrap();

        assert_eq!(
            store.subscribers_matching("hey BOB!").await,
            vec![("bob".to_string(), 10), ("bob".to_string(), 11)]
        );
        assert!(store.subscribers_matching("bobby is here").await.is_empty());
        assert_eq!(
            store.subscribers_matching("Big News everyone").await,
            vec![("big news".to_string(), 12)]
        );
    }

    #[tokio::test]
    async fn test_user_preferences() {
        let (store, saves) = store_with_counter();

        assert_eq!(store.read().await.preference(5), UserPreference::default());
        assert_eq!(store.ensure_preference(5).await.unwrap(), Mutation::Applied);
        assert_eq!(store.ensure_preference(5).await.unwrap(), Mutation::Unchanged);

        assert_eq!(store.set_detect_presence(5, true).await.unwrap(), Mutation::Applied);
        assert_eq!(store.set_detect_presence(5, true).await.unwrap(), Mutation::Unchanged);

        assert_eq!(store.add_ignore(5, "Troll").await.unwrap(), Mutation::Applied);
        assert_eq!(store.add_ignore(5, "troll").await.unwrap(), Mutation::Unchanged);
        let prefs = store.read().await.preference(5);
        assert!(prefs.detect_presence);
        assert!(prefs.ignores.contains("troll"));

        assert_eq!(store.remove_ignore(5, "TROLL").await.unwrap(), Mutation::Applied);
        assert_eq!(store.remove_ignore(5, "troll").await.unwrap(), Mutation::Unchanged);
        assert_eq!(saves.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_emotes_keep_insertion_order() {
        let (store, _) = store_with_counter();

        store.add_emote("Zeta", "<:z:1>").await.unwrap();
        store.add_emote("Alpha", "<:a:2>").await.unwrap();
        assert_eq!(store.add_emote("Alpha", "<:a:2>").await.unwrap(), Mutation::Unchanged);

        let keys: Vec<_> = store.emotes().await.keys().cloned().collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);

        assert_eq!(store.remove_emote("Zeta").await.unwrap(), Mutation::Applied);
        assert_eq!(store.remove_emote("Zeta").await.unwrap(), Mutation::Unchanged);
    }

    #[tokio::test]
    async fn test_purge() {
        let (store, _) = store_with_counter();

        store.add_relay("alice", 1).await.unwrap();
        store.add_relay("alice", 2).await.unwrap();
        store.add_phrase("word", 3).await.unwrap();

        assert_eq!(store.purge_relay("ALICE").await.unwrap(), Mutation::Applied);
        assert_eq!(store.purge_phrase("word").await.unwrap(), Mutation::Applied);
        assert_eq!(store.purge_phrase("word").await.unwrap(), Mutation::Unchanged);
        assert!(store.read().await.relays.is_empty());
    }

    #[tokio::test]
    async fn test_listing_queries() {
        let (store, _) = store_with_counter();

        store.add_relay("alice", 1).await.unwrap();
        store.add_relay("bob", 1).await.unwrap();
        store.add_relay("bob", 2).await.unwrap();
        store.add_phrase("rust", 9).await.unwrap();

        assert_eq!(store.relays_for_channel(1).await, vec!["alice", "bob"]);
        assert_eq!(store.relays_for_channel(2).await, vec!["bob"]);
        assert_eq!(store.phrases_for_user(9).await, vec!["rust"]);
        assert!(store.phrases_for_user(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_live_settings() {
        let (store, _) = store_with_counter();

        store.set_live_enabled(1, true).await.unwrap();
        store.set_live_role(1, Some(99)).await.unwrap();
        store.set_live_role(2, Some(98)).await.unwrap();

        assert_eq!(store.read().await.live_targets(), vec![(1, Some(99))]);
        assert_eq!(store.set_broadcast(Some("abc".into())).await.unwrap(), Mutation::Applied);
        assert_eq!(store.set_broadcast(Some("abc".into())).await.unwrap(), Mutation::Unchanged);
        assert_eq!(store.live().await.broadcast_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let (store, saves) = store_with_counter();

        assert!(matches!(
            store.add_relay("  ", 1).await,
            Err(StoreError::InvalidValue { .. })
        ));
        assert!(store.add_phrase("", 1).await.is_err());
        assert_eq!(saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let hook = CountingHook {
            saves: Arc::new(AtomicUsize::new(0)),
            fail: true,
        };
        let store = SubscriptionStore::new(Subscriptions::default(), Box::new(hook));

        let result = store.add_relay("alice", 1).await;
        assert!(matches!(result, Err(StoreError::Persist { .. })));
        assert_eq!(store.add_relay("alice", 1).await.unwrap(), Mutation::Unchanged);
    }

    #[test]
    fn test_tables_serialize_as_json() {
        let mut subs = Subscriptions::default();
        subs.relays.insert("alice".to_string(), vec![7]);
        subs.user_prefs.insert(5, UserPreference::default());
        subs.live.channels.insert(
            3,
            LiveChannel {
                enabled: true,
                role: None,
            },
        );

        let json = serde_json::to_string(&subs).unwrap();
        let back: Subscriptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, subs);

        let empty: Subscriptions = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Subscriptions::default());
    }
}

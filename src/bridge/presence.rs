//! DGG chat roster.
//!
//! The DGG client keeps the roster current from NAMES/JOIN/QUIT events and the
//! relay engine asks it who is in chat right now.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Case-insensitive set of nicks currently in DGG chat.
///
/// Cloning yields another handle to the same roster.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    names: Arc<RwLock<HashSet<String>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `name` is in chat.
    pub fn is_present(&self, name: &str) -> bool {
        self.read().contains(&name.to_lowercase())
    }

    /// Replace the whole roster (NAMES on connect).
    pub fn replace_all<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster = self.write();
        roster.clear();
        roster.extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
    }

    pub fn join(&self, name: &str) {
        self.write().insert(name.to_lowercase());
    }

    pub fn quit(&self, name: &str) {
        self.write().remove(&name.to_lowercase());
    }

    /// Forget everyone, e.g. after losing the connection.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    // Poisoning is ignored: every writer leaves the set consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashSet<String>> {
        self.names.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<String>> {
        self.names.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_updates() {
        let presence = PresenceTracker::new();
        presence.replace_all(["Destiny", "bob"]);

        assert!(presence.is_present("destiny"));
        assert!(presence.is_present("BOB"));
        assert!(!presence.is_present("alice"));

        presence.join("Alice");
        presence.quit("BOB");
        assert!(presence.is_present("alice"));
        assert!(!presence.is_present("bob"));
        assert_eq!(presence.len(), 2);

        presence.replace_all(Vec::<String>::new());
        assert_eq!(presence.len(), 0);
    }

    #[test]
    fn test_clones_share_roster() {
        let reader = PresenceTracker::new();
        let writer = reader.clone();

        writer.join("carol");
        assert!(reader.is_present("Carol"));
        writer.clear();
        assert!(!reader.is_present("carol"));
    }
}

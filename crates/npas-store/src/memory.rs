//! In-memory implementations of the storage traits.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{FlagRecord, Settings};
use crate::{Conversation, FlagStore, PeerConversation};

/// A flag store backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flags: RwLock<BTreeMap<String, FlagRecord>>,
}

impl MemoryFlagStore {
    /// Create an empty flag store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every set flag, in lexical order.
    #[must_use]
    pub fn all_flags(&self) -> Vec<String> {
        self.flags.read().keys().cloned().collect()
    }
}

impl FlagStore for MemoryFlagStore {
    fn set_flag(&self, flag: &str) -> Result<()> {
        self.flags
            .write()
            .entry(flag.to_string())
            .or_insert_with(FlagRecord::now);
        Ok(())
    }

    fn clear_flag(&self, flag: &str) -> Result<()> {
        self.flags.write().remove(flag);
        Ok(())
    }

    fn is_flag_set(&self, flag: &str) -> Result<bool> {
        Ok(self.flags.read().contains_key(flag))
    }

    fn list_flags(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .flags
            .read()
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name.clone())
            .collect())
    }
}

/// A conversation held entirely in memory.
///
/// Every call to [`Conversation::set_remote`] is also appended to a write log
/// so callers can assert on exactly what was published and how often.
#[derive(Debug, Default)]
pub struct MemoryConversation {
    remote: RwLock<BTreeMap<String, String>>,
    local: RwLock<BTreeMap<String, String>>,
    writes: RwLock<Vec<Settings>>,
}

impl MemoryConversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a single key as the peer.
    pub fn set_peer_value(&self, key: impl Into<String>, value: impl Into<String>) {
        self.remote.write().insert(key.into(), value.into());
    }

    /// Withdraw a single key as the peer.
    pub fn unset_peer_value(&self, key: &str) {
        self.remote.write().remove(key);
    }

    /// Every update passed to `set_remote`, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<Settings> {
        self.writes.read().clone()
    }

    /// The value this side currently publishes for `key`.
    #[must_use]
    pub fn local_value(&self, key: &str) -> Option<String> {
        self.local.read().get(key).cloned()
    }
}

fn apply(target: &mut BTreeMap<String, String>, settings: &Settings) {
    for (key, value) in settings {
        match value {
            Some(value) => {
                target.insert(key.clone(), value.clone());
            }
            None => {
                target.remove(key);
            }
        }
    }
}

impl Conversation for MemoryConversation {
    fn get_remote(&self, key: &str) -> Result<Option<String>> {
        Ok(self.remote.read().get(key).cloned())
    }

    fn set_remote(&self, settings: &Settings) -> Result<()> {
        apply(&mut self.local.write(), settings);
        self.writes.write().push(settings.clone());
        Ok(())
    }
}

impl PeerConversation for MemoryConversation {
    fn publish_as_peer(&self, settings: &Settings) -> Result<()> {
        apply(&mut self.remote.write(), settings);
        Ok(())
    }

    fn local_settings(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.local.read().clone())
    }
}

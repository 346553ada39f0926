//! Flag and conversation storage for the relation adapter.
//!
//! Two collaborators sit underneath the relation coordinator:
//!
//! - a [`FlagStore`]: a process-wide namespace of boolean markers, persisted
//!   across hook invocations and keyed by fully qualified flag names such as
//!   `neutron-plugin-api-subordinate.connected`;
//! - a [`Conversation`]: the key/value exchange with the peer on one relation.
//!   Reads see what the peer published, writes publish our own settings.
//!
//! Both come in an in-memory flavour (tests, simulations) and a `RocksDB`
//! flavour that survives process restarts.
//!
//! # Architecture
//!
//! The `RocksDB` storage uses the following column families:
//!
//! - `flags`: one entry per set flag, value is a CBOR [`FlagRecord`]
//! - `remote_settings`: the peer's published data, keyed by `relation || 0x00 || key`
//! - `local_settings`: our published data, same key layout
//!
//! # Example
//!
//! ```no_run
//! use npas_core::RelationName;
//! use npas_store::{Conversation, FlagStore, RocksStore};
//!
//! let store = RocksStore::open("/tmp/npas-data").unwrap();
//! store.set_flag("neutron-plugin-api-subordinate.connected").unwrap();
//!
//! let relation = RelationName::new("neutron-plugin-api-subordinate").unwrap();
//! let conversation = store.conversation(&relation);
//! let ready = conversation.get_remote("neutron-api-ready").unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use error::{Result, StoreError};
pub use memory::{MemoryConversation, MemoryFlagStore};
pub use rocks::{RocksConversation, RocksStore};
pub use types::{FlagRecord, Settings};

/// A process-wide namespace of persistent boolean flags.
///
/// Setting an already set flag and clearing an unset flag are both no-ops.
pub trait FlagStore: Send + Sync {
    /// Set a flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn set_flag(&self, flag: &str) -> Result<()>;

    /// Clear a flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn clear_flag(&self, flag: &str) -> Result<()>;

    /// Check whether a flag is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn is_flag_set(&self, flag: &str) -> Result<bool>;

    /// List every set flag whose name starts with `prefix`, in lexical order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn list_flags(&self, prefix: &str) -> Result<Vec<String>>;
}

/// The key/value exchange with the peer on a single relation.
pub trait Conversation: Send + Sync {
    /// Read a key the peer has published, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn get_remote(&self, key: &str) -> Result<Option<String>>;

    /// Publish settings to the peer. Each key is overwritten or unset
    /// independently; keys not mentioned are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn set_remote(&self, settings: &Settings) -> Result<()>;
}

/// The other end of a [`Conversation`].
///
/// Used to simulate the principal: publish what the peer would publish and
/// inspect what we have published.
pub trait PeerConversation: Conversation {
    /// Apply settings as if the peer had published them.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn publish_as_peer(&self, settings: &Settings) -> Result<()>;

    /// Everything this side has published so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails.
    fn local_settings(&self) -> Result<BTreeMap<String, String>>;
}

impl<T: FlagStore + ?Sized> FlagStore for Arc<T> {
    fn set_flag(&self, flag: &str) -> Result<()> {
        (**self).set_flag(flag)
    }

    fn clear_flag(&self, flag: &str) -> Result<()> {
        (**self).clear_flag(flag)
    }

    fn is_flag_set(&self, flag: &str) -> Result<bool> {
        (**self).is_flag_set(flag)
    }

    fn list_flags(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_flags(prefix)
    }
}

impl<T: Conversation + ?Sized> Conversation for Arc<T> {
    fn get_remote(&self, key: &str) -> Result<Option<String>> {
        (**self).get_remote(key)
    }

    fn set_remote(&self, settings: &Settings) -> Result<()> {
        (**self).set_remote(settings)
    }
}

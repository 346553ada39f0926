//! Records persisted by the storage layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A per-key update to a conversation.
///
/// `Some(value)` overwrites the key, `None` unsets it. Keys not present in the
/// map are left untouched.
pub type Settings = BTreeMap<String, Option<String>>;

/// A flag as persisted in the flag column family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    /// When the flag was (last) set.
    pub set_at: DateTime<Utc>,
}

impl FlagRecord {
    /// A record stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self { set_at: Utc::now() }
    }
}

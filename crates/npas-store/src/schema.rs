//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Local flags, keyed by the fully qualified flag name.
    pub const FLAGS: &str = "flags";

    /// Settings published by the peer, keyed by `relation || 0x00 || key`.
    pub const REMOTE_SETTINGS: &str = "remote_settings";

    /// Settings published by this unit, keyed by `relation || 0x00 || key`.
    pub const LOCAL_SETTINGS: &str = "local_settings";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::FLAGS, cf::REMOTE_SETTINGS, cf::LOCAL_SETTINGS]
}

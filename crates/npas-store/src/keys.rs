//! Key encoding utilities for `RocksDB`.
//!
//! Flags are stored under their UTF-8 name. Conversation settings are stored
//! under `relation || 0x00 || key` so a prefix scan returns one relation's
//! settings. Relation names never contain NUL, so the split is unambiguous.

use npas_core::RelationName;

use crate::error::{Result, StoreError};

const SETTING_SEPARATOR: u8 = 0x00;

/// Encode a flag key.
#[must_use]
pub fn flag_key(flag: &str) -> Vec<u8> {
    flag.as_bytes().to_vec()
}

/// Decode a flag name from a stored key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is not valid UTF-8.
pub fn decode_flag_key(key: &[u8]) -> Result<String> {
    String::from_utf8(key.to_vec()).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Encode a conversation setting key: `relation || 0x00 || key`.
#[must_use]
pub fn setting_key(relation: &RelationName, key: &str) -> Vec<u8> {
    let mut out = relation_prefix(relation);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Encode the prefix shared by every setting of a relation.
#[must_use]
pub fn relation_prefix(relation: &RelationName) -> Vec<u8> {
    let mut out = Vec::with_capacity(relation.as_str().len() + 1);
    out.extend_from_slice(relation.as_str().as_bytes());
    out.push(SETTING_SEPARATOR);
    out
}

/// Extract the setting name from a key produced by [`setting_key`].
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key does not start with the
/// relation prefix or the remainder is not valid UTF-8.
pub fn extract_setting_name(relation: &RelationName, key: &[u8]) -> Result<String> {
    let prefix = relation_prefix(relation);
    let rest = key.strip_prefix(prefix.as_slice()).ok_or_else(|| {
        StoreError::Serialization(format!("key outside relation {relation}"))
    })?;
    String::from_utf8(rest.to_vec()).map_err(|e| StoreError::Serialization(e.to_string()))
}

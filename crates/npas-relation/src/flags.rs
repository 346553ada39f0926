//! Local flag names for one relation.
//!
//! ```text
//! <relation>.connected
//! <relation>.available
//! <relation>.db_migration
//! <relation>.db_migration.<nonce>
//! ```

use npas_core::{Nonce, RelationName, FLAG_SEPARATOR};
use npas_store::FlagStore;
use serde::Serialize;

use crate::error::Result;

const CONNECTED: &str = "connected";
const AVAILABLE: &str = "available";
const DB_MIGRATION: &str = "db_migration";

/// Flag names scoped to a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationFlags {
    relation: RelationName,
}

impl RelationFlags {
    /// Flag names for `relation`.
    #[must_use]
    pub const fn new(relation: RelationName) -> Self {
        Self { relation }
    }

    /// The relation these flags belong to.
    #[must_use]
    pub const fn relation(&self) -> &RelationName {
        &self.relation
    }

    /// `<relation>.connected`
    #[must_use]
    pub fn connected(&self) -> String {
        self.relation.flag(CONNECTED)
    }

    /// `<relation>.available`
    #[must_use]
    pub fn available(&self) -> String {
        self.relation.flag(AVAILABLE)
    }

    /// `<relation>.db_migration`
    #[must_use]
    pub fn db_migration(&self) -> String {
        self.relation.flag(DB_MIGRATION)
    }

    /// `<relation>.db_migration.<nonce>`
    #[must_use]
    pub fn db_migration_nonce(&self, nonce: &Nonce) -> String {
        format!("{}{FLAG_SEPARATOR}{nonce}", self.db_migration())
    }

    /// True for the base migration flag and every nonce variant, but not for
    /// unrelated flags that merely share the textual prefix.
    #[must_use]
    pub fn is_migration_flag(&self, flag: &str) -> bool {
        let base = self.db_migration();
        flag.strip_prefix(base.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(FLAG_SEPARATOR))
    }

    /// Every migration flag currently set.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag store fails.
    pub fn migration_flags<F: FlagStore + ?Sized>(&self, store: &F) -> Result<Vec<String>> {
        Ok(store
            .list_flags(&self.db_migration())?
            .into_iter()
            .filter(|flag| self.is_migration_flag(flag))
            .collect())
    }

    /// Read the relation's state out of the flag store.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag store fails.
    pub fn read_state<F: FlagStore + ?Sized>(&self, store: &F) -> Result<RelationState> {
        let nonce_prefix = format!("{}{FLAG_SEPARATOR}", self.db_migration());
        let outstanding_nonces = self
            .migration_flags(store)?
            .iter()
            .filter_map(|flag| flag.strip_prefix(nonce_prefix.as_str()))
            .map(str::to_string)
            .collect();

        Ok(RelationState {
            relation: self.relation.clone(),
            connected: store.is_flag_set(&self.connected())?,
            available: store.is_flag_set(&self.available())?,
            migration_requested: store.is_flag_set(&self.db_migration())?,
            outstanding_nonces,
        })
    }
}

/// Point-in-time view of a relation's local flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationState {
    /// The relation.
    pub relation: RelationName,
    /// `connected` is set.
    pub connected: bool,
    /// `available` is set.
    pub available: bool,
    /// The base `db_migration` flag is set.
    pub migration_requested: bool,
    /// Nonces with a `db_migration.<nonce>` flag, in lexical order.
    pub outstanding_nonces: Vec<String>,
}

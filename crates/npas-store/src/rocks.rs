//! `RocksDB` storage implementation.
//!
//! This module provides `RocksStore`, which implements [`FlagStore`] directly
//! and hands out per-relation [`RocksConversation`]s sharing the same database.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use npas_core::RelationName;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{FlagRecord, Settings};
use crate::{Conversation, FlagStore, PeerConversation};

type Db = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed storage implementation.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// The conversation for one relation, backed by this database.
    #[must_use]
    pub fn conversation(&self, relation: &RelationName) -> RocksConversation {
        RocksConversation {
            db: Arc::clone(&self.db),
            relation: relation.clone(),
        }
    }

    /// Read the record of a set flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flag_record(&self, flag: &str) -> Result<Option<FlagRecord>> {
        let cf = column(&self.db, cf::FLAGS)?;
        self.db
            .get_cf(&cf, keys::flag_key(flag))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| deserialize(&data))
            .transpose()
    }
}

/// Get a column family handle.
fn column<'a>(db: &'a Db, name: &str) -> Result<Arc<BoundColumnFamily<'a>>> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
}

/// Serialize a value using CBOR.
fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl FlagStore for RocksStore {
    fn set_flag(&self, flag: &str) -> Result<()> {
        let cf = column(&self.db, cf::FLAGS)?;
        let key = keys::flag_key(flag);

        let exists = self
            .db
            .get_pinned_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Ok(());
        }

        let value = serialize(&FlagRecord::now())?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::trace!(flag, "Set flag");
        Ok(())
    }

    fn clear_flag(&self, flag: &str) -> Result<()> {
        let cf = column(&self.db, cf::FLAGS)?;
        self.db
            .delete_cf(&cf, keys::flag_key(flag))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::trace!(flag, "Cleared flag");
        Ok(())
    }

    fn is_flag_set(&self, flag: &str) -> Result<bool> {
        let cf = column(&self.db, cf::FLAGS)?;
        Ok(self
            .db
            .get_pinned_cf(&cf, keys::flag_key(flag))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }

    fn list_flags(&self, prefix: &str) -> Result<Vec<String>> {
        let cf = column(&self.db, cf::FLAGS)?;
        let prefix = keys::flag_key(prefix);

        let mut flags = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            // Stop if we're past the prefix
            if !key.starts_with(&prefix) {
                break;
            }

            flags.push(keys::decode_flag_key(&key)?);
        }

        Ok(flags)
    }
}

/// One relation's conversation stored in `RocksDB`.
#[derive(Clone)]
pub struct RocksConversation {
    db: Arc<Db>,
    relation: RelationName,
}

impl RocksConversation {
    /// The relation this conversation belongs to.
    #[must_use]
    pub const fn relation(&self) -> &RelationName {
        &self.relation
    }

    fn read(&self, cf_name: &str, key: &str) -> Result<Option<String>> {
        let cf = column(&self.db, cf_name)?;
        self.db
            .get_cf(&cf, keys::setting_key(&self.relation, key))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| deserialize(&data))
            .transpose()
    }

    fn write(&self, cf_name: &str, settings: &Settings) -> Result<()> {
        let cf = column(&self.db, cf_name)?;

        let mut batch = WriteBatch::default();
        for (key, value) in settings {
            let key = keys::setting_key(&self.relation, key);
            match value {
                Some(value) => batch.put_cf(&cf, key, serialize(value)?),
                None => batch.delete_cf(&cf, key),
            }
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn scan(&self, cf_name: &str) -> Result<BTreeMap<String, String>> {
        let cf = column(&self.db, cf_name)?;
        let prefix = keys::relation_prefix(&self.relation);

        let mut settings = BTreeMap::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            let name = keys::extract_setting_name(&self.relation, &key)?;
            settings.insert(name, deserialize(&value)?);
        }

        Ok(settings)
    }

    /// Everything the peer has published on this relation.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remote_settings(&self) -> Result<BTreeMap<String, String>> {
        self.scan(cf::REMOTE_SETTINGS)
    }
}

impl Conversation for RocksConversation {
    fn get_remote(&self, key: &str) -> Result<Option<String>> {
        self.read(cf::REMOTE_SETTINGS, key)
    }

    fn set_remote(&self, settings: &Settings) -> Result<()> {
        self.write(cf::LOCAL_SETTINGS, settings)?;
        tracing::debug!(relation = %self.relation, keys = settings.len(), "Published settings");
        Ok(())
    }
}

impl PeerConversation for RocksConversation {
    fn publish_as_peer(&self, settings: &Settings) -> Result<()> {
        self.write(cf::REMOTE_SETTINGS, settings)
    }

    fn local_settings(&self) -> Result<BTreeMap<String, String>> {
        self.scan(cf::LOCAL_SETTINGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn settings(pairs: &[(&str, Option<&str>)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn flag_lifecycle() {
        let (store, _dir) = create_test_store();

        store.set_flag("rel.connected").unwrap();
        assert!(store.is_flag_set("rel.connected").unwrap());
        assert!(store.flag_record("rel.connected").unwrap().is_some());

        store.clear_flag("rel.connected").unwrap();
        assert!(!store.is_flag_set("rel.connected").unwrap());
        assert!(store.flag_record("rel.connected").unwrap().is_none());
    }

    #[test]
    fn set_flag_keeps_original_timestamp() {
        let (store, _dir) = create_test_store();

        store.set_flag("rel.available").unwrap();
        let first = store.flag_record("rel.available").unwrap().unwrap();
        store.set_flag("rel.available").unwrap();
        let second = store.flag_record("rel.available").unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn list_flags_by_prefix() {
        let (store, _dir) = create_test_store();

        store.set_flag("rel.db_migration").unwrap();
        store.set_flag("rel.db_migration.a").unwrap();
        store.set_flag("rel.db_migration.b").unwrap();
        store.set_flag("rel.connected").unwrap();
        store.set_flag("zzz.db_migration").unwrap();

        let flags = store.list_flags("rel.db_migration").unwrap();
        assert_eq!(
            flags,
            vec!["rel.db_migration", "rel.db_migration.a", "rel.db_migration.b"]
        );
        assert_eq!(store.list_flags("rel.").unwrap().len(), 4);
    }

    #[test]
    fn flags_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.set_flag("rel.connected").unwrap();
        }
        let store = RocksStore::open(dir.path()).unwrap();
        assert!(store.is_flag_set("rel.connected").unwrap());
    }

    #[test]
    fn conversation_sides_are_separate() {
        let (store, _dir) = create_test_store();
        let relation = RelationName::new("rel").unwrap();
        let conversation = store.conversation(&relation);

        conversation
            .publish_as_peer(&settings(&[("neutron-api-ready", Some("yes"))]))
            .unwrap();
        conversation
            .set_remote(&settings(&[("neutron-plugin", Some("ovs"))]))
            .unwrap();

        assert_eq!(
            conversation.get_remote("neutron-api-ready").unwrap().as_deref(),
            Some("yes")
        );
        assert_eq!(conversation.get_remote("neutron-plugin").unwrap(), None);

        let local = conversation.local_settings().unwrap();
        assert_eq!(local.get("neutron-plugin").map(String::as_str), Some("ovs"));
        assert_eq!(local.len(), 1);
        assert_eq!(conversation.remote_settings().unwrap().len(), 1);
    }

    #[test]
    fn conversation_unset_removes_key() {
        let (store, _dir) = create_test_store();
        let relation = RelationName::new("rel").unwrap();
        let conversation = store.conversation(&relation);

        conversation
            .set_remote(&settings(&[
                ("core-plugin", Some("ml2")),
                ("service-plugins", Some("router")),
            ]))
            .unwrap();
        conversation
            .set_remote(&settings(&[("core-plugin", None)]))
            .unwrap();

        let local = conversation.local_settings().unwrap();
        assert!(!local.contains_key("core-plugin"));
        assert_eq!(local.get("service-plugins").map(String::as_str), Some("router"));
    }

    #[test]
    fn conversations_are_scoped_by_relation() {
        let (store, _dir) = create_test_store();
        let a = store.conversation(&RelationName::new("plugin").unwrap());
        let b = store.conversation(&RelationName::new("plugin-api").unwrap());

        b.publish_as_peer(&settings(&[("neutron-api-ready", Some("yes"))]))
            .unwrap();

        assert_eq!(a.get_remote("neutron-api-ready").unwrap(), None);
        assert!(a.remote_settings().unwrap().is_empty());
        assert_eq!(b.remote_settings().unwrap().len(), 1);
    }
}

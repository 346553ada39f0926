//! Drive the coordinator the way the hosting framework does: every hook is a
//! fresh process that reopens the persistent store, builds a coordinator,
//! handles one event and exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use npas_relation::{
    PluginConfiguration, RelationConfig, RelationEvent, RelationName, RelationState,
    SubordinateConfiguration, SubordinateRelationCoordinator,
};
use npas_store::{PeerConversation, RocksConversation, RocksStore, Settings};
use serde_json::Value;
use tempfile::TempDir;

type Coordinator = SubordinateRelationCoordinator<RocksStore, RocksConversation>;

fn relation() -> RelationName {
    RelationName::new("neutron-plugin-api-subordinate").unwrap()
}

/// Open the store and run `f` against a fresh coordinator, then drop both.
fn invoke<T>(dir: &TempDir, f: impl FnOnce(&Coordinator) -> T) -> T {
    let store = RocksStore::open(dir.path()).unwrap();
    let conversation = Arc::new(store.conversation(&relation()));
    let coordinator = SubordinateRelationCoordinator::new(
        Arc::new(store),
        conversation,
        RelationConfig::for_relation(relation()),
    );
    f(&coordinator)
}

/// Publish data as the principal would.
fn peer_publishes(dir: &TempDir, pairs: &[(&str, &str)]) {
    let store = RocksStore::open(dir.path()).unwrap();
    let settings: Settings = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Some((*v).to_string())))
        .collect();
    store
        .conversation(&relation())
        .publish_as_peer(&settings)
        .unwrap();
}

fn published(dir: &TempDir) -> BTreeMap<String, String> {
    let store = RocksStore::open(dir.path()).unwrap();
    store.conversation(&relation()).local_settings().unwrap()
}

fn state(dir: &TempDir) -> RelationState {
    invoke(dir, |c| c.state().unwrap())
}

#[test]
fn connected_persists_until_broken() {
    let dir = TempDir::new().unwrap();

    invoke(&dir, |c| c.handle_event(RelationEvent::Joined).unwrap());
    assert!(state(&dir).connected);
    assert!(!state(&dir).available);

    for _ in 0..3 {
        invoke(&dir, |c| c.handle_event(RelationEvent::Changed).unwrap());
        assert!(state(&dir).connected);
    }

    invoke(&dir, |c| c.handle_event(RelationEvent::Broken).unwrap());
    let after = state(&dir);
    assert!(!after.connected);
    assert!(!after.available);
}

#[test]
fn migration_across_invocations() {
    let dir = TempDir::new().unwrap();

    peer_publishes(&dir, &[("neutron-api-ready", "yes")]);
    invoke(&dir, |c| c.handle_event(RelationEvent::Changed).unwrap());
    assert!(state(&dir).available);

    let nonce = invoke(&dir, |c| c.request_db_migration().unwrap()).unwrap();
    assert_eq!(
        published(&dir).get("migrate-database-nonce").map(String::as_str),
        Some(nonce.as_str())
    );
    let pending = state(&dir);
    assert!(!pending.available);
    assert_eq!(pending.outstanding_nonces, vec![nonce.to_string()]);

    // Stale re-delivery before the peer has echoed anything.
    invoke(&dir, |c| c.handle_event(RelationEvent::Changed).unwrap());
    assert!(!state(&dir).available);

    peer_publishes(&dir, &[("migrate-database-nonce", nonce.as_str())]);
    invoke(&dir, |c| c.handle_event(RelationEvent::Changed).unwrap());

    let resolved = state(&dir);
    assert!(resolved.available);
    assert!(!resolved.migration_requested);
    assert!(resolved.outstanding_nonces.is_empty());
}

#[test]
fn departed_then_rejoined_with_stale_nonce() {
    let dir = TempDir::new().unwrap();

    peer_publishes(&dir, &[("neutron-api-ready", "yes")]);
    let nonce = invoke(&dir, |c| c.request_db_migration().unwrap()).unwrap();
    invoke(&dir, |c| c.handle_event(RelationEvent::Departed).unwrap());

    // Migration bookkeeping survives departure.
    assert!(state(&dir).migration_requested);

    invoke(&dir, |c| c.handle_event(RelationEvent::Joined).unwrap());
    assert!(!state(&dir).available);

    peer_publishes(&dir, &[("migrate-database-nonce", nonce.as_str())]);
    invoke(&dir, |c| c.handle_event(RelationEvent::Changed).unwrap());
    assert!(state(&dir).available);
}

#[test]
fn configuration_and_restart_are_published() {
    let dir = TempDir::new().unwrap();

    let mut subordinate = SubordinateConfiguration::new();
    subordinate.insert(
        "neutron-api",
        "/etc/neutron/neutron.conf",
        "DEFAULT",
        "service_plugins",
        "router",
    );
    let configuration = PluginConfiguration::new("ovs")
        .core_plugin("neutron.plugins.ml2.plugin.Ml2Plugin")
        .subordinate_configuration(Value::try_from(&subordinate).unwrap());

    invoke(&dir, |c| c.send_configuration(&configuration).unwrap());
    let token = invoke(&dir, |c| c.request_restart(Some("neutron")).unwrap());

    let settings = published(&dir);
    assert_eq!(settings.get("neutron-plugin").map(String::as_str), Some("ovs"));
    assert_eq!(
        settings.get("restart-trigger-neutron").map(String::as_str),
        Some(token.as_str())
    );
    assert!(!settings.contains_key("service-plugins"));

    let raw = &settings["subordinate_configuration"];
    let decoded: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(decoded, Value::try_from(&subordinate).unwrap());

    let seen_by_principal = PluginConfiguration::from_settings(&settings).unwrap();
    assert_eq!(seen_by_principal, configuration);
}

//! Typed records for the data exchanged over the relation.
//!
//! Everything on the wire is a flat string-to-string map; nested data is
//! JSON-encoded into a single value. The records here are the only place that
//! knows the key names, and `to_settings` / `read` are the only crossings of
//! the serialization boundary.

use std::collections::BTreeMap;

use npas_core::Nonce;
use npas_store::{Conversation, Settings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DecodePolicy;
use crate::error::{RelationError, Result};

/// Outbound key names.
pub mod keys {
    /// Plugin name, e.g. `ovs` or `odl`.
    pub const NEUTRON_PLUGIN: &str = "neutron-plugin";
    /// Core plugin class path.
    pub const CORE_PLUGIN: &str = "core-plugin";
    /// Path of the plugin configuration file.
    pub const NEUTRON_PLUGIN_CONFIG: &str = "neutron-plugin-config";
    /// Comma separated service plugins.
    pub const SERVICE_PLUGINS: &str = "service-plugins";
    /// Comma separated ML2 extension drivers.
    pub const EXTENSION_DRIVERS: &str = "extension-drivers";
    /// Comma separated ML2 mechanism drivers.
    pub const MECHANISM_DRIVERS: &str = "mechanism-drivers";
    /// Comma separated tenant network types.
    pub const TENANT_NETWORK_TYPES: &str = "tenant-network-types";
    /// Security group toggle.
    pub const NEUTRON_SECURITY_GROUPS: &str = "neutron-security-groups";
    /// JSON-encoded configuration for the principal to inject.
    pub const SUBORDINATE_CONFIGURATION: &str = "subordinate_configuration";
    /// Restart trigger for all services.
    pub const RESTART_TRIGGER: &str = "restart-trigger";
    /// Migration request token, written by us and echoed by the peer.
    pub const MIGRATE_DATABASE_NONCE: &str = "migrate-database-nonce";

    /// Inbound readiness marker.
    pub const NEUTRON_API_READY: &str = "neutron-api-ready";
    /// Inbound JSON-encoded configuration data.
    pub const NEUTRON_CONFIG_DATA: &str = "neutron_config_data";
}

/// Value of `neutron-api-ready` that marks the peer as ready.
pub const READY: &str = "yes";

/// Configuration files the principal should manage on our behalf.
///
/// Layout: principal name → file path → sections → ordered `(key, value)`
/// pairs. Pairs keep insertion order; they are sent as two-element arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubordinateConfiguration(BTreeMap<String, BTreeMap<String, ConfigFile>>);

/// The sections to inject into one configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Section name to ordered `(key, value)` pairs.
    pub sections: BTreeMap<String, Vec<(String, String)>>,
}

impl SubordinateConfiguration {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key = value` to `section` of `path` managed by `principal`.
    pub fn insert(
        &mut self,
        principal: &str,
        path: &str,
        section: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.0
            .entry(principal.to_string())
            .or_default()
            .entry(path.to_string())
            .or_default()
            .sections
            .entry(section.to_string())
            .or_default()
            .push((key.into(), value.into()));
        self
    }

    /// The file entries for one principal.
    #[must_use]
    pub fn principal(&self, principal: &str) -> Option<&BTreeMap<String, ConfigFile>> {
        self.0.get(principal)
    }

    /// Returns true if nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&SubordinateConfiguration> for Value {
    type Error = RelationError;

    fn try_from(config: &SubordinateConfiguration) -> Result<Self> {
        serde_json::to_value(config).map_err(|source| RelationError::Encode {
            key: keys::SUBORDINATE_CONFIGURATION,
            source,
        })
    }
}

/// The plugin description published to the principal.
///
/// Only `plugin` is required. Every other field left as `None` is unset on
/// the relation rather than sent as an empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfiguration {
    /// Plugin name, e.g. `ovs`.
    pub plugin: String,
    /// Core plugin class path.
    pub core_plugin: Option<String>,
    /// Plugin configuration file path.
    pub neutron_plugin_config: Option<String>,
    /// Comma separated service plugins.
    pub service_plugins: Option<String>,
    /// Configuration for the principal to inject; `None` is sent as `{}`.
    pub subordinate_configuration: Option<Value>,
    /// Comma separated extension drivers.
    pub extension_drivers: Option<String>,
    /// Comma separated mechanism drivers.
    pub mechanism_drivers: Option<String>,
    /// Comma separated tenant network types.
    pub tenant_network_types: Option<String>,
    /// Security group toggle.
    pub neutron_security_groups: Option<String>,
}

impl PluginConfiguration {
    /// A configuration naming only the plugin.
    #[must_use]
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            core_plugin: None,
            neutron_plugin_config: None,
            service_plugins: None,
            subordinate_configuration: None,
            extension_drivers: None,
            mechanism_drivers: None,
            tenant_network_types: None,
            neutron_security_groups: None,
        }
    }

    /// Set the core plugin.
    #[must_use]
    pub fn core_plugin(mut self, value: impl Into<String>) -> Self {
        self.core_plugin = Some(value.into());
        self
    }

    /// Set the plugin configuration file.
    #[must_use]
    pub fn neutron_plugin_config(mut self, value: impl Into<String>) -> Self {
        self.neutron_plugin_config = Some(value.into());
        self
    }

    /// Set the service plugins.
    #[must_use]
    pub fn service_plugins(mut self, value: impl Into<String>) -> Self {
        self.service_plugins = Some(value.into());
        self
    }

    /// Set the subordinate configuration from any JSON value.
    #[must_use]
    pub fn subordinate_configuration(mut self, value: impl Into<Value>) -> Self {
        self.subordinate_configuration = Some(value.into());
        self
    }

    /// Set the extension drivers.
    #[must_use]
    pub fn extension_drivers(mut self, value: impl Into<String>) -> Self {
        self.extension_drivers = Some(value.into());
        self
    }

    /// Set the mechanism drivers.
    #[must_use]
    pub fn mechanism_drivers(mut self, value: impl Into<String>) -> Self {
        self.mechanism_drivers = Some(value.into());
        self
    }

    /// Set the tenant network types.
    #[must_use]
    pub fn tenant_network_types(mut self, value: impl Into<String>) -> Self {
        self.tenant_network_types = Some(value.into());
        self
    }

    /// Set the security group toggle.
    #[must_use]
    pub fn neutron_security_groups(mut self, value: impl Into<String>) -> Self {
        self.neutron_security_groups = Some(value.into());
        self
    }

    /// Encode as a full snapshot of the nine configuration keys.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Encode` if the subordinate configuration cannot
    /// be serialized.
    pub fn to_settings(&self) -> Result<Settings> {
        let empty = Value::Object(Map::new());
        let subordinate = self.subordinate_configuration.as_ref().unwrap_or(&empty);
        let subordinate =
            serde_json::to_string(subordinate).map_err(|source| RelationError::Encode {
                key: keys::SUBORDINATE_CONFIGURATION,
                source,
            })?;

        let mut settings = Settings::new();
        settings.insert(keys::NEUTRON_PLUGIN.into(), Some(self.plugin.clone()));
        settings.insert(keys::CORE_PLUGIN.into(), self.core_plugin.clone());
        settings.insert(
            keys::NEUTRON_PLUGIN_CONFIG.into(),
            self.neutron_plugin_config.clone(),
        );
        settings.insert(keys::SERVICE_PLUGINS.into(), self.service_plugins.clone());
        settings.insert(keys::SUBORDINATE_CONFIGURATION.into(), Some(subordinate));
        settings.insert(
            keys::EXTENSION_DRIVERS.into(),
            self.extension_drivers.clone(),
        );
        settings.insert(
            keys::MECHANISM_DRIVERS.into(),
            self.mechanism_drivers.clone(),
        );
        settings.insert(
            keys::TENANT_NETWORK_TYPES.into(),
            self.tenant_network_types.clone(),
        );
        settings.insert(
            keys::NEUTRON_SECURITY_GROUPS.into(),
            self.neutron_security_groups.clone(),
        );
        Ok(settings)
    }

    /// Decode a configuration from published settings, as the principal sees it.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::MissingKey` if `neutron-plugin` is absent and
    /// `RelationError::MalformedRemoteJson` if `subordinate_configuration` is
    /// not valid JSON.
    pub fn from_settings(settings: &BTreeMap<String, String>) -> Result<Self> {
        let get = |key: &str| settings.get(key).cloned();
        let plugin =
            get(keys::NEUTRON_PLUGIN).ok_or(RelationError::MissingKey(keys::NEUTRON_PLUGIN))?;
        let subordinate_configuration = settings
            .get(keys::SUBORDINATE_CONFIGURATION)
            .map(|raw| serde_json::from_str::<Value>(raw))
            .transpose()
            .map_err(|source| RelationError::MalformedRemoteJson {
                key: keys::SUBORDINATE_CONFIGURATION,
                source,
            })?;

        Ok(Self {
            plugin,
            core_plugin: get(keys::CORE_PLUGIN),
            neutron_plugin_config: get(keys::NEUTRON_PLUGIN_CONFIG),
            service_plugins: get(keys::SERVICE_PLUGINS),
            subordinate_configuration,
            extension_drivers: get(keys::EXTENSION_DRIVERS),
            mechanism_drivers: get(keys::MECHANISM_DRIVERS),
            tenant_network_types: get(keys::TENANT_NETWORK_TYPES),
            neutron_security_groups: get(keys::NEUTRON_SECURITY_GROUPS),
        })
    }
}

/// A request for the principal to restart services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    /// Service type to restart; `None` restarts everything.
    pub service_type: Option<String>,
    /// Fresh token; only its change is observed by the peer.
    pub token: Nonce,
}

impl RestartRequest {
    /// Build a request. An empty service type is treated as "all services".
    #[must_use]
    pub fn new(service_type: Option<&str>, token: Nonce) -> Self {
        Self {
            service_type: service_type.filter(|s| !s.is_empty()).map(str::to_string),
            token,
        }
    }

    /// The relation key this request is published under.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.service_type {
            Some(service) => format!("{}-{service}", keys::RESTART_TRIGGER),
            None => keys::RESTART_TRIGGER.to_string(),
        }
    }

    /// Encode as a single-key update.
    #[must_use]
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(self.key(), Some(self.token.to_string()));
        settings
    }
}

/// A request for the principal to run database migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    /// Token the peer echoes back once it has picked the request up.
    pub nonce: Nonce,
}

impl MigrationRequest {
    /// Encode as a single-key update.
    #[must_use]
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::new();
        settings.insert(
            keys::MIGRATE_DATABASE_NONCE.into(),
            Some(self.nonce.to_string()),
        );
        settings
    }
}

/// The peer's published data, as read at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSnapshot {
    /// Raw `neutron-api-ready`.
    pub api_ready: Option<String>,
    /// Raw `neutron_config_data`.
    pub config_data: Option<String>,
    /// Raw `migrate-database-nonce`.
    pub migrate_nonce: Option<String>,
}

impl RelationSnapshot {
    /// Read every inbound key from the conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation store fails.
    pub fn read<C: Conversation + ?Sized>(conversation: &C) -> Result<Self> {
        Ok(Self {
            api_ready: conversation.get_remote(keys::NEUTRON_API_READY)?,
            config_data: conversation.get_remote(keys::NEUTRON_CONFIG_DATA)?,
            migrate_nonce: conversation.get_remote(keys::MIGRATE_DATABASE_NONCE)?,
        })
    }

    /// True iff the peer published exactly `"yes"`.
    #[must_use]
    pub fn is_peer_ready(&self) -> bool {
        self.api_ready.as_deref() == Some(READY)
    }

    /// The nonce the peer echoed back, empty when none.
    #[must_use]
    pub fn migrate_nonce(&self) -> Nonce {
        Nonce::from_remote(self.migrate_nonce.clone().unwrap_or_default())
    }

    /// Decode `neutron_config_data`, defaulting to `{}` when absent.
    ///
    /// # Errors
    ///
    /// Under [`DecodePolicy::Strict`], returns `MalformedRemoteJson` for
    /// invalid JSON and `NotAnObject` for JSON that is not an object. Under
    /// [`DecodePolicy::Lenient`] both cases yield an empty map.
    pub fn config_data(&self, policy: DecodePolicy) -> Result<Map<String, Value>> {
        let raw = self.config_data.as_deref().unwrap_or("{}");
        let decoded = serde_json::from_str::<Value>(raw)
            .map_err(|source| RelationError::MalformedRemoteJson {
                key: keys::NEUTRON_CONFIG_DATA,
                source,
            })
            .and_then(|value| match value {
                Value::Object(map) => Ok(map),
                _ => Err(RelationError::NotAnObject {
                    key: keys::NEUTRON_CONFIG_DATA,
                }),
            });

        match (decoded, policy) {
            (Ok(map), _) => Ok(map),
            (Err(e), DecodePolicy::Lenient) => {
                tracing::warn!(error = %e, "Ignoring malformed neutron_config_data");
                Ok(Map::new())
            }
            (Err(e), DecodePolicy::Strict) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_configuration_settings() {
        let settings = PluginConfiguration::new("aPlugin")
            .core_plugin("aCorePlugin")
            .neutron_plugin_config("aNeutronPluginConfig")
            .service_plugins("servicePlugins1,servicePlugin2")
            .subordinate_configuration(json!({"aKey": "aValue"}))
            .extension_drivers("extensionDriver1,extensionDriver2")
            .mechanism_drivers("mechanismDriver1,mechanismDriver2")
            .tenant_network_types("typeDriver1,typeDriver2")
            .neutron_security_groups("toggleSecurityGroups")
            .to_settings()
            .unwrap();

        assert_eq!(settings.len(), 9);
        let get = |k: &str| settings.get(k).cloned().flatten();
        assert_eq!(get("neutron-plugin").as_deref(), Some("aPlugin"));
        assert_eq!(get("core-plugin").as_deref(), Some("aCorePlugin"));
        assert_eq!(
            get("neutron-plugin-config").as_deref(),
            Some("aNeutronPluginConfig")
        );
        assert_eq!(
            get("service-plugins").as_deref(),
            Some("servicePlugins1,servicePlugin2")
        );
        assert_eq!(
            get("extension-drivers").as_deref(),
            Some("extensionDriver1,extensionDriver2")
        );
        assert_eq!(
            get("mechanism-drivers").as_deref(),
            Some("mechanismDriver1,mechanismDriver2")
        );
        assert_eq!(
            get("tenant-network-types").as_deref(),
            Some("typeDriver1,typeDriver2")
        );
        assert_eq!(
            get("neutron-security-groups").as_deref(),
            Some("toggleSecurityGroups")
        );
        assert_eq!(
            get("subordinate_configuration").as_deref(),
            Some(r#"{"aKey":"aValue"}"#)
        );
    }

    #[test]
    fn minimal_configuration_unsets_optional_keys() {
        let settings = PluginConfiguration::new("ovs").to_settings().unwrap();
        assert_eq!(settings.len(), 9);
        assert_eq!(settings["core-plugin"], None);
        assert_eq!(settings["neutron-security-groups"], None);
        assert_eq!(settings["subordinate_configuration"].as_deref(), Some("{}"));
    }

    #[test]
    fn subordinate_configuration_roundtrip() {
        let settings = PluginConfiguration::new("ovs")
            .subordinate_configuration(json!({"a": 1}))
            .to_settings()
            .unwrap();
        let raw = settings["subordinate_configuration"].clone().unwrap();
        let decoded: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[test]
    fn typed_subordinate_configuration_keeps_pair_order() {
        let mut config = SubordinateConfiguration::new();
        config
            .insert("neutron-api", "/etc/neutron/neutron.conf", "DEFAULT", "key2", "val2")
            .insert("neutron-api", "/etc/neutron/neutron.conf", "DEFAULT", "key1", "val1")
            .insert("neutron-api", "/etc/neutron/neutron.conf", "agent", "key3", "val3");

        let value = Value::try_from(&config).unwrap();
        assert_eq!(
            value,
            json!({
                "neutron-api": {
                    "/etc/neutron/neutron.conf": {
                        "sections": {
                            "DEFAULT": [["key2", "val2"], ["key1", "val1"]],
                            "agent": [["key3", "val3"]],
                        }
                    }
                }
            })
        );

        let parsed: SubordinateConfiguration = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);

        let files = parsed.principal("neutron-api").unwrap();
        assert_eq!(files["/etc/neutron/neutron.conf"].sections["agent"].len(), 1);
        assert!(parsed.principal("nova-compute").is_none());
    }

    #[test]
    fn from_settings_reads_back_published_configuration() {
        let original = PluginConfiguration::new("odl")
            .core_plugin("neutron.plugins.ml2.plugin.Ml2Plugin")
            .subordinate_configuration(json!({"k": "v"}));
        let published: BTreeMap<String, String> = original
            .to_settings()
            .unwrap()
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();

        let parsed = PluginConfiguration::from_settings(&published).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn from_settings_requires_plugin() {
        let result = PluginConfiguration::from_settings(&BTreeMap::new());
        assert!(matches!(result, Err(RelationError::MissingKey("neutron-plugin"))));
    }

    #[test]
    fn restart_keys() {
        let token = Nonce::from_remote("fake-uuid");
        let all = RestartRequest::new(None, token.clone());
        assert_eq!(all.key(), "restart-trigger");
        assert_eq!(
            all.to_settings()["restart-trigger"].as_deref(),
            Some("fake-uuid")
        );

        let one = RestartRequest::new(Some("aServiceType"), token.clone());
        assert_eq!(one.key(), "restart-trigger-aServiceType");

        assert_eq!(RestartRequest::new(Some(""), token).key(), "restart-trigger");
    }

    #[test]
    fn peer_ready_is_exact() {
        let mut snapshot = RelationSnapshot::default();
        assert!(!snapshot.is_peer_ready());
        for value in ["Yes", "YES", "yes ", "true", ""] {
            snapshot.api_ready = Some(value.to_string());
            assert!(!snapshot.is_peer_ready(), "{value:?} must not count");
        }
        snapshot.api_ready = Some("yes".to_string());
        assert!(snapshot.is_peer_ready());
    }

    #[test]
    fn config_data_defaults_to_empty_object() {
        let snapshot = RelationSnapshot::default();
        assert!(snapshot.config_data(DecodePolicy::Strict).unwrap().is_empty());
    }

    #[test]
    fn config_data_decode_policies() {
        let snapshot = RelationSnapshot {
            config_data: Some("{not json".to_string()),
            ..RelationSnapshot::default()
        };
        assert!(matches!(
            snapshot.config_data(DecodePolicy::Strict),
            Err(RelationError::MalformedRemoteJson { .. })
        ));
        assert!(snapshot.config_data(DecodePolicy::Lenient).unwrap().is_empty());

        let snapshot = RelationSnapshot {
            config_data: Some("[1, 2]".to_string()),
            ..RelationSnapshot::default()
        };
        assert!(matches!(
            snapshot.config_data(DecodePolicy::Strict),
            Err(RelationError::NotAnObject { .. })
        ));
        assert!(snapshot.config_data(DecodePolicy::Lenient).unwrap().is_empty());
    }

    #[test]
    fn config_data_decodes_object() {
        let snapshot = RelationSnapshot {
            config_data: Some(r#"{"k": "v"}"#.to_string()),
            ..RelationSnapshot::default()
        };
        let data = snapshot.config_data(DecodePolicy::Strict).unwrap();
        assert_eq!(data.get("k"), Some(&json!("v")));
    }

    #[test]
    fn migrate_nonce_defaults_to_empty() {
        assert!(RelationSnapshot::default().migrate_nonce().is_empty());
    }
}

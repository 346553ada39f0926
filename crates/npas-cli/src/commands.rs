//! Command implementations for the hook runner.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;
use npas_relation::{
    PluginConfiguration, RelationConfig, RelationEvent, RelationName, RelationState,
    SubordinateRelationCoordinator,
};
use npas_store::{PeerConversation, RocksConversation, RocksStore, Settings};
use serde::Serialize;
use serde_json::{Map, Value};

/// Flags for `configure`.
#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Plugin name, e.g. `ovs`.
    #[arg(long)]
    plugin: String,
    /// Core plugin class path.
    #[arg(long)]
    core_plugin: Option<String>,
    /// Plugin configuration file path.
    #[arg(long)]
    neutron_plugin_config: Option<String>,
    /// Comma separated service plugins.
    #[arg(long)]
    service_plugins: Option<String>,
    /// JSON document for the principal to inject into its configuration.
    #[arg(long, value_parser = parse_json)]
    subordinate_configuration: Option<Value>,
    /// Comma separated extension drivers.
    #[arg(long)]
    extension_drivers: Option<String>,
    /// Comma separated mechanism drivers.
    #[arg(long)]
    mechanism_drivers: Option<String>,
    /// Comma separated tenant network types.
    #[arg(long)]
    tenant_network_types: Option<String>,
    /// Security group toggle.
    #[arg(long)]
    neutron_security_groups: Option<String>,
}

impl ConfigureArgs {
    fn to_configuration(&self) -> PluginConfiguration {
        PluginConfiguration {
            plugin: self.plugin.clone(),
            core_plugin: self.core_plugin.clone(),
            neutron_plugin_config: self.neutron_plugin_config.clone(),
            service_plugins: self.service_plugins.clone(),
            subordinate_configuration: self.subordinate_configuration.clone(),
            extension_drivers: self.extension_drivers.clone(),
            mechanism_drivers: self.mechanism_drivers.clone(),
            tenant_network_types: self.tenant_network_types.clone(),
            neutron_security_groups: self.neutron_security_groups.clone(),
        }
    }
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_setting(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| e.to_string())
}

/// Load the relation configuration, applying the relation name override.
pub fn load_config(path: Option<&Path>, relation: Option<&str>) -> anyhow::Result<RelationConfig> {
    let mut config: RelationConfig = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => RelationConfig::default(),
    };
    if let Some(name) = relation {
        config.relation_name = RelationName::new(name)?;
    }
    Ok(config)
}

/// Everything one invocation needs.
pub struct Context {
    conversation: Arc<RocksConversation>,
    coordinator: SubordinateRelationCoordinator<RocksStore, RocksConversation>,
}

#[derive(Serialize)]
struct StatusReport {
    state: RelationState,
    remote: BTreeMap<String, String>,
    local: BTreeMap<String, String>,
    config_data: Option<Map<String, Value>>,
}

impl Context {
    /// Open the data directory and build a coordinator for the relation.
    pub fn open(data_dir: &Path, config: RelationConfig) -> anyhow::Result<Self> {
        let store = RocksStore::open(data_dir)
            .with_context(|| format!("opening {}", data_dir.display()))?;
        let conversation = Arc::new(store.conversation(&config.relation_name));
        let coordinator =
            SubordinateRelationCoordinator::new(Arc::new(store), Arc::clone(&conversation), config);
        Ok(Self {
            conversation,
            coordinator,
        })
    }

    /// The relation being driven.
    pub fn relation(&self) -> &RelationName {
        self.coordinator.flag_names().relation()
    }

    /// Dispatch a hook by its full name.
    pub fn run_hook(&self, name: &str) -> anyhow::Result<()> {
        let event = RelationEvent::from_hook_name(&self.coordinator.config().interface, name)?;
        self.coordinator.handle_event(event)?;
        Ok(())
    }

    /// Publish the plugin configuration.
    pub fn configure(&self, args: &ConfigureArgs) -> anyhow::Result<()> {
        self.coordinator.send_configuration(&args.to_configuration())?;
        Ok(())
    }

    pub fn restart(&self, service_type: Option<&str>) -> anyhow::Result<()> {
        let token = self.coordinator.request_restart(service_type)?;
        println!("{token}");
        Ok(())
    }

    /// Request a migration. Before the peer is ready nothing is published or
    /// printed and the command still succeeds.
    pub fn migrate(&self) -> anyhow::Result<()> {
        match self.coordinator.request_db_migration()? {
            Some(nonce) => println!("{nonce}"),
            None => tracing::info!(
                relation = %self.relation(),
                "Peer not ready, migration not requested"
            ),
        }
        Ok(())
    }

    pub fn peer_set(&self, settings: Vec<(String, String)>) -> anyhow::Result<()> {
        let settings: Settings = settings.into_iter().map(|(k, v)| (k, Some(v))).collect();
        self.conversation.publish_as_peer(&settings)?;
        Ok(())
    }

    pub fn peer_unset(&self, keys: Vec<String>) -> anyhow::Result<()> {
        let settings: Settings = keys.into_iter().map(|k| (k, None)).collect();
        self.conversation.publish_as_peer(&settings)?;
        Ok(())
    }

    pub fn status(&self) -> anyhow::Result<()> {
        let config_data = match self.coordinator.remote_config_data() {
            Ok(data) => Some(data),
            Err(e) if e.is_remote_fault() => {
                tracing::warn!(error = %e, "Peer published malformed config data");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let report = StatusReport {
            state: self.coordinator.state()?,
            remote: self.conversation.remote_settings()?,
            local: self.conversation.local_settings()?,
            config_data,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

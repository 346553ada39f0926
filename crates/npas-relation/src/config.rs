//! Coordinator configuration.

use npas_core::RelationName;
use serde::Deserialize;

/// Default relation endpoint and interface name.
pub const DEFAULT_INTERFACE: &str = "neutron-plugin-api-subordinate";

/// What to do when the peer publishes `neutron_config_data` that does not
/// decode to a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Surface the decode failure to the caller.
    #[default]
    Strict,
    /// Log a warning and treat the value as `{}`.
    Lenient,
}

/// Configuration for one relation coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationConfig {
    /// Relation endpoint name; prefixes every local flag.
    #[serde(default = "RelationConfig::default_relation_name")]
    pub relation_name: RelationName,

    /// Interface name used as the hook-name prefix.
    #[serde(default = "RelationConfig::default_interface")]
    pub interface: String,

    /// Policy for malformed `neutron_config_data`.
    #[serde(default)]
    pub decode_policy: DecodePolicy,
}

impl RelationConfig {
    fn default_relation_name() -> RelationName {
        RelationName::new(DEFAULT_INTERFACE).expect("default relation name is valid")
    }

    fn default_interface() -> String {
        DEFAULT_INTERFACE.to_string()
    }

    /// Default configuration for a differently named relation endpoint.
    #[must_use]
    pub fn for_relation(relation_name: RelationName) -> Self {
        Self {
            relation_name,
            ..Self::default()
        }
    }

    /// Replace the decode policy.
    #[must_use]
    pub const fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            relation_name: Self::default_relation_name(),
            interface: Self::default_interface(),
            decode_policy: DecodePolicy::default(),
        }
    }
}

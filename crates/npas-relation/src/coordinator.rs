//! The subordinate side of the relation.
//!
//! # Flags
//!
//! ```text
//!   joined/changed                     broken/departed
//!  ───────────────▶ connected ───────────────────────▶ (cleared)
//!                      │
//!                      │ peer ready && !migration pending
//!                      ▼
//!                  available ◀──── reaped on nonce echo
//!                      │                    ▲
//!                      │ request_db_migration│
//!                      ▼                    │
//!            db_migration + db_migration.<nonce>
//! ```
//!
//! Handlers re-read everything they need on every call, so delivering the
//! same event twice, or a stale changed event after a newer one, converges
//! on the state implied by the peer's current data.

use std::sync::Arc;

use npas_core::{Nonce, NonceSource, RandomNonces};
use npas_store::{Conversation, FlagStore};
use serde_json::{Map, Value};

use crate::config::RelationConfig;
use crate::error::Result;
use crate::event::RelationEvent;
use crate::flags::{RelationFlags, RelationState};
use crate::wire::{MigrationRequest, PluginConfiguration, RelationSnapshot, RestartRequest};

/// Owns the connected/available/migration state of one relation to one
/// principal.
pub struct SubordinateRelationCoordinator<F: FlagStore, C: Conversation> {
    flags: Arc<F>,
    conversation: Arc<C>,
    names: RelationFlags,
    config: RelationConfig,
    nonces: Arc<dyn NonceSource>,
}

impl<F: FlagStore, C: Conversation> SubordinateRelationCoordinator<F, C> {
    /// Create a coordinator using random UUID tokens.
    #[must_use]
    pub fn new(flags: Arc<F>, conversation: Arc<C>, config: RelationConfig) -> Self {
        Self {
            flags,
            conversation,
            names: RelationFlags::new(config.relation_name.clone()),
            config,
            nonces: Arc::new(RandomNonces),
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(flags: Arc<F>, conversation: Arc<C>) -> Self {
        Self::new(flags, conversation, RelationConfig::default())
    }

    /// Replace the token source.
    #[must_use]
    pub fn with_nonce_source(mut self, nonces: Arc<dyn NonceSource>) -> Self {
        self.nonces = nonces;
        self
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &RelationConfig {
        &self.config
    }

    /// Flag names for this relation.
    #[must_use]
    pub const fn flag_names(&self) -> &RelationFlags {
        &self.names
    }

    /// Dispatch a hook event to its handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler fails.
    pub fn handle_event(&self, event: RelationEvent) -> Result<()> {
        tracing::debug!(relation = %self.names.relation(), %event, "Handling relation event");
        if event.is_establishing() {
            self.on_relation_joined_or_changed()
        } else {
            self.on_relation_broken_or_departed()
        }
    }

    /// Mark the relation connected and recompute `available`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn on_relation_joined_or_changed(&self) -> Result<()> {
        self.flags.set_flag(&self.names.connected())?;

        let available = self.is_peer_ready()? && !self.is_migration_pending()?;
        if available {
            self.flags.set_flag(&self.names.available())?;
        } else {
            self.flags.clear_flag(&self.names.available())?;
        }

        tracing::info!(relation = %self.names.relation(), available, "Relation connected");
        Ok(())
    }

    /// Clear `available`, then `connected`.
    ///
    /// Migration flags are left for [`Self::is_migration_pending`] to reap.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn on_relation_broken_or_departed(&self) -> Result<()> {
        self.flags.clear_flag(&self.names.available())?;
        self.flags.clear_flag(&self.names.connected())?;
        tracing::info!(relation = %self.names.relation(), "Relation gone");
        Ok(())
    }

    /// Whether the peer has published `neutron-api-ready = yes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation store fails.
    pub fn is_peer_ready(&self) -> Result<bool> {
        Ok(self.snapshot()?.is_peer_ready())
    }

    /// The peer's `neutron_config_data`, decoded under the configured policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails, or the value is malformed and the
    /// policy is strict.
    pub fn remote_config_data(&self) -> Result<Map<String, Value>> {
        self.snapshot()?.config_data(self.config.decode_policy)
    }

    /// Publish the plugin configuration as one full snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the conversation store fails.
    pub fn send_configuration(&self, configuration: &PluginConfiguration) -> Result<()> {
        let settings = configuration.to_settings()?;
        self.conversation.set_remote(&settings)?;
        tracing::info!(
            relation = %self.names.relation(),
            plugin = %configuration.plugin,
            "Sent plugin configuration"
        );
        Ok(())
    }

    /// Ask the principal to restart `service_type`, or every service when
    /// `None`. Returns the token that was published.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation store fails.
    pub fn request_restart(&self, service_type: Option<&str>) -> Result<Nonce> {
        let request = RestartRequest::new(service_type, self.nonces.next_nonce());
        self.conversation.set_remote(&request.to_settings())?;
        tracing::info!(
            relation = %self.names.relation(),
            key = %request.key(),
            token = %request.token,
            "Requested restart"
        );
        Ok(request.token)
    }

    /// Ask the principal to run database migrations.
    ///
    /// Dropped (returns `None`, touches nothing) while the peer is not ready.
    /// Otherwise publishes a fresh nonce, records it locally and withdraws
    /// `available` until the peer echoes the nonce back.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn request_db_migration(&self) -> Result<Option<Nonce>> {
        if !self.is_peer_ready()? {
            tracing::debug!(
                relation = %self.names.relation(),
                "Peer not ready, dropping migration request"
            );
            return Ok(None);
        }

        let request = MigrationRequest {
            nonce: self.nonces.next_nonce(),
        };
        self.conversation.set_remote(&request.to_settings())?;
        self.flags.set_flag(&self.names.db_migration())?;
        self.flags
            .set_flag(&self.names.db_migration_nonce(&request.nonce))?;
        self.flags.clear_flag(&self.names.available())?;

        tracing::info!(
            relation = %self.names.relation(),
            nonce = %request.nonce,
            "Requested database migration"
        );
        Ok(Some(request.nonce))
    }

    /// Whether a migration request is still waiting for the peer.
    ///
    /// A peer nonce matching any recorded `db_migration.<nonce>` flag resolves
    /// the migration: every migration flag of this relation is purged.
    ///
    /// # Errors
    ///
    /// Returns an error if a store operation fails.
    pub fn is_migration_pending(&self) -> Result<bool> {
        if !self.flags.is_flag_set(&self.names.db_migration())? {
            return Ok(false);
        }

        let remote_nonce = self.snapshot()?.migrate_nonce();
        let echoed = self
            .flags
            .is_flag_set(&self.names.db_migration_nonce(&remote_nonce))?;
        if !echoed {
            return Ok(true);
        }

        let stale = self.names.migration_flags(self.flags.as_ref())?;
        for flag in &stale {
            self.flags.clear_flag(flag)?;
        }
        tracing::info!(
            relation = %self.names.relation(),
            nonce = %remote_nonce,
            reaped = stale.len(),
            "Database migration acknowledged"
        );
        Ok(false)
    }

    /// Current local flags of this relation.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag store fails.
    pub fn state(&self) -> Result<RelationState> {
        self.names.read_state(self.flags.as_ref())
    }

    fn snapshot(&self) -> Result<RelationSnapshot> {
        RelationSnapshot::read(self.conversation.as_ref())
    }
}

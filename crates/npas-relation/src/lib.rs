//! Subordinate side of the `neutron-plugin-api-subordinate` relation.
//!
//! A subordinate charm publishes its plugin configuration, restart requests
//! and database-migration requests to the principal, and tracks three local
//! flags derived from what the principal publishes back:
//!
//! - `<relation>.connected`: the relation exists
//! - `<relation>.available`: the principal is ready and no migration is pending
//! - `<relation>.db_migration[.<nonce>]`: a migration request is outstanding
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use npas_relation::{PluginConfiguration, RelationEvent, SubordinateRelationCoordinator};
//! use npas_store::{MemoryConversation, MemoryFlagStore};
//!
//! let flags = Arc::new(MemoryFlagStore::new());
//! let conversation = Arc::new(MemoryConversation::new());
//! let coordinator = SubordinateRelationCoordinator::with_defaults(flags, Arc::clone(&conversation));
//!
//! conversation.set_peer_value("neutron-api-ready", "yes");
//! coordinator.handle_event(RelationEvent::Changed).unwrap();
//! assert!(coordinator.state().unwrap().available);
//!
//! coordinator
//!     .send_configuration(&PluginConfiguration::new("ovs").service_plugins("router"))
//!     .unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod flags;
pub mod wire;

pub use config::{DecodePolicy, RelationConfig, DEFAULT_INTERFACE};
pub use coordinator::SubordinateRelationCoordinator;
pub use error::{RelationError, Result};
pub use event::RelationEvent;
pub use flags::{RelationFlags, RelationState};
pub use wire::{
    ConfigFile, MigrationRequest, PluginConfiguration, RelationSnapshot, RestartRequest,
    SubordinateConfiguration,
};

// Re-export commonly used types from dependencies for convenience
pub use npas_core::{Nonce, NonceSource, RelationName};

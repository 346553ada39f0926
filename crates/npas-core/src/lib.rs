//! Core types for the neutron-plugin-api-subordinate relation adapter.
//!
//! This crate provides the foundational types shared by the other crates:
//!
//! - **Identifiers**: validated relation names and opaque nonces
//! - **Nonce sources**: injectable token generation
//!
//! # Example
//!
//! ```
//! use npas_core::{Nonce, RelationName};
//!
//! let relation = RelationName::new("neutron-plugin-api-subordinate").unwrap();
//! assert_eq!(relation.flag("connected"), "neutron-plugin-api-subordinate.connected");
//!
//! let nonce = Nonce::generate();
//! assert!(!nonce.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod nonce;

pub use ids::{IdError, Nonce, RelationName, FLAG_SEPARATOR};
pub use nonce::{NonceSource, RandomNonces, ScriptedNonces};

//! Error types for the relation coordinator.

use thiserror::Error;

/// A result type using `RelationError`.
pub type Result<T> = std::result::Result<T, RelationError>;

/// Errors that can occur while handling relation events or requests.
#[derive(Debug, Error)]
pub enum RelationError {
    /// The peer published a value that is not valid JSON.
    #[error("malformed JSON in remote key {key}: {source}")]
    MalformedRemoteJson {
        /// The remote key holding the value.
        key: &'static str,
        /// The decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// The peer published valid JSON of the wrong shape.
    #[error("remote key {key} is not a JSON object")]
    NotAnObject {
        /// The remote key holding the value.
        key: &'static str,
    },

    /// A local value could not be encoded for publishing.
    #[error("failed to encode {key}: {source}")]
    Encode {
        /// The outbound key being encoded.
        key: &'static str,
        /// The encode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A published settings map lacks a required key.
    #[error("missing required key {0}")]
    MissingKey(&'static str),

    /// The hook name does not belong to this interface.
    #[error("unrecognised hook {0:?}")]
    UnknownHook(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] npas_store::StoreError),
}

impl RelationError {
    /// Returns true if this error came from the peer's published data rather
    /// than from this unit.
    #[must_use]
    pub const fn is_remote_fault(&self) -> bool {
        matches!(
            self,
            Self::MalformedRemoteJson { .. } | Self::NotAnObject { .. }
        )
    }
}

//! Identifier types for relations and exchange tokens.
//!
//! Relation names scope every local flag, so they are validated on the way in.
//! Nonces are opaque: the peer may echo back anything, and only equality matters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between a relation name and the flag suffix.
pub const FLAG_SEPARATOR: char = '.';

/// The name of a relation endpoint, e.g. `neutron-plugin-api-subordinate`.
///
/// Names are non-empty, contain no whitespace and never contain the flag
/// separator, so `<relation>.<flag>` always splits unambiguously.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationName(String);

impl RelationName {
    /// Parse and validate a relation name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains whitespace, or contains
    /// the flag separator.
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdError::EmptyRelationName);
        }
        if let Some(c) = name
            .chars()
            .find(|c| *c == FLAG_SEPARATOR || c.is_whitespace())
        {
            return Err(IdError::InvalidRelationChar { name, found: c });
        }
        Ok(Self(name))
    }

    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the fully qualified flag name `<relation>.<suffix>`.
    #[must_use]
    pub fn flag(&self, suffix: &str) -> String {
        format!("{}{FLAG_SEPARATOR}{suffix}", self.0)
    }
}

impl fmt::Debug for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationName({})", self.0)
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RelationName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelationName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelationName> for String {
    fn from(name: RelationName) -> Self {
        name.0
    }
}

impl AsRef<str> for RelationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An opaque change token.
///
/// Locally generated nonces are UUID v4 strings. Nonces read back from the
/// peer are taken verbatim, including the empty string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap a token received from the peer.
    #[must_use]
    pub fn from_remote(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Return the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the token is empty (peer has not published one).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.0)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The relation name is empty.
    #[error("relation name must not be empty")]
    EmptyRelationName,

    /// The relation name contains a character that would break flag naming.
    #[error("invalid character {found:?} in relation name {name:?}")]
    InvalidRelationChar {
        /// The rejected name.
        name: String,
        /// The offending character.
        found: char,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_name_valid() {
        let name = RelationName::new("neutron-plugin-api-subordinate").unwrap();
        assert_eq!(name.as_str(), "neutron-plugin-api-subordinate");
        assert_eq!(
            name.flag("connected"),
            "neutron-plugin-api-subordinate.connected"
        );
    }

    #[test]
    fn relation_name_rejects_separator() {
        let result = RelationName::new("bad.name");
        assert!(matches!(
            result,
            Err(IdError::InvalidRelationChar { found: '.', .. })
        ));
    }

    #[test]
    fn relation_name_rejects_empty_and_whitespace() {
        assert_eq!(RelationName::new(""), Err(IdError::EmptyRelationName));
        assert!(RelationName::new("has space").is_err());
    }

    #[test]
    fn relation_name_serde_json() {
        let name = RelationName::new("plugin").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"plugin\"");
        let parsed: RelationName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);

        let bad: Result<RelationName, _> = serde_json::from_str("\"a.b\"");
        assert!(bad.is_err());
    }

    #[test]
    fn nonce_generate_is_uuid() {
        let nonce = Nonce::generate();
        assert!(uuid::Uuid::parse_str(nonce.as_str()).is_ok());
        assert_ne!(nonce, Nonce::generate());
    }

    #[test]
    fn remote_nonce_is_verbatim() {
        let nonce = Nonce::from_remote("");
        assert!(nonce.is_empty());
        assert_eq!(Nonce::from_remote("not-a-uuid").as_str(), "not-a-uuid");
    }
}

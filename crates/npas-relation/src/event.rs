//! Relation hook events.
//!
//! The hosting framework runs one hook per occurrence, named
//! `<interface>-relation-<event>`. Joined and changed share a handler, as do
//! departed and broken.

use std::fmt;
use std::str::FromStr;

use crate::error::RelationError;

/// A relation lifecycle occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationEvent {
    /// The peer joined the relation.
    Joined,
    /// The peer's published data changed (or the hook re-fired).
    Changed,
    /// The peer unit departed.
    Departed,
    /// The relation was removed.
    Broken,
}

impl RelationEvent {
    /// Every event, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Joined, Self::Changed, Self::Departed, Self::Broken];

    /// The hook suffix, e.g. `changed`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Changed => "changed",
            Self::Departed => "departed",
            Self::Broken => "broken",
        }
    }

    /// True for events that (re-)establish the relation.
    #[must_use]
    pub const fn is_establishing(self) -> bool {
        matches!(self, Self::Joined | Self::Changed)
    }

    /// The full hook name for this event on `interface`.
    #[must_use]
    pub fn hook_name(self, interface: &str) -> String {
        format!("{interface}-relation-{}", self.as_str())
    }

    /// Parse a full hook name, e.g.
    /// `neutron-plugin-api-subordinate-relation-changed`.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::UnknownHook` if the name does not belong to
    /// `interface` or names an unknown event.
    pub fn from_hook_name(interface: &str, hook: &str) -> Result<Self, RelationError> {
        hook.strip_prefix(interface)
            .and_then(|rest| rest.strip_prefix("-relation-"))
            .and_then(|event| event.parse().ok())
            .ok_or_else(|| RelationError::UnknownHook(hook.to_string()))
    }
}

impl fmt::Display for RelationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationEvent {
    type Err = RelationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| RelationError::UnknownHook(s.to_string()))
    }
}

//! Sources of fresh change tokens.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::ids::Nonce;

/// Produces fresh tokens for restart triggers and migration requests.
pub trait NonceSource: Send + Sync {
    /// Return a token that has not been handed out before.
    fn next_nonce(&self) -> Nonce;
}

/// Random UUID v4 tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNonces;

impl NonceSource for RandomNonces {
    fn next_nonce(&self) -> Nonce {
        Nonce::generate()
    }
}

/// Hands out a scripted sequence of tokens, then falls back to `<prefix>-<n>`.
///
/// Useful in tests where the exact token has to be asserted on.
#[derive(Debug)]
pub struct ScriptedNonces {
    queue: Mutex<(VecDeque<String>, u64)>,
    prefix: String,
}

impl ScriptedNonces {
    /// Create a source that yields `tokens` in order.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new((tokens.into_iter().map(Into::into).collect(), 0)),
            prefix: "nonce".to_string(),
        }
    }

    /// Create a source that only yields `<prefix>-<n>` counters.
    #[must_use]
    pub fn counter(prefix: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new((VecDeque::new(), 0)),
            prefix: prefix.into(),
        }
    }
}

impl NonceSource for ScriptedNonces {
    fn next_nonce(&self) -> Nonce {
        let mut guard = self.queue.lock();
        let (queue, counter) = &mut *guard;
        if let Some(token) = queue.pop_front() {
            return Nonce::from_remote(token);
        }
        *counter += 1;
        Nonce::from_remote(format!("{}-{counter}", self.prefix))
    }
}

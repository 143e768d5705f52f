//! The immutable rules context.
//!
//! Attack tables and Zobrist keys are built once at startup into a [`Rules`]
//! value. Board operations take it by reference, and long-lived owners such as
//! matches hold it behind an [`Arc`].

use std::sync::Arc;

use tracing::debug;

use crate::board::AttackTables;
use crate::zobrist::ZobristKeys;

#[derive(Debug)]
pub struct Rules {
    attacks: AttackTables,
    zobrist: ZobristKeys,
}

impl Rules {
    #[must_use]
    pub fn new() -> Self {
        let started = std::time::Instant::now();
        let rules = Rules {
            attacks: AttackTables::new(),
            zobrist: ZobristKeys::new(),
        };
        debug!(elapsed = ?started.elapsed(), "rules context built");
        rules
    }

    /// Build the context and wrap it for sharing between tasks.
    #[must_use]
    pub fn shared() -> Arc<Rules> {
        Arc::new(Rules::new())
    }

    #[inline]
    #[must_use]
    pub fn attacks(&self) -> &AttackTables {
        &self.attacks
    }

    #[inline]
    #[must_use]
    pub fn zobrist(&self) -> &ZobristKeys {
        &self.zobrist
    }
}

impl Default for Rules {
    fn default() -> Self {
        Rules::new()
    }
}

/// One context per test binary; building the magic tables is not free.
#[cfg(test)]
static TEST_RULES: once_cell::sync::Lazy<Arc<Rules>> = once_cell::sync::Lazy::new(Rules::shared);

#[cfg(test)]
pub(crate) fn for_tests() -> &'static Rules {
    &TEST_RULES
}

#[cfg(test)]
pub(crate) fn shared_for_tests() -> Arc<Rules> {
    Arc::clone(&TEST_RULES)
}

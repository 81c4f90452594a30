// crates/reelgraph-core/src/core/time.rs
// ============================================================================
// Module: Reelgraph Time
// Description: Timestamp representation used throughout the engine.
// Purpose: Keep the core free of direct wall-clock reads; callers supply
//          timestamps explicitly.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The core never reads the wall clock itself. Callers (the dispatcher, the
//! CLI) stamp events and manifests with a [`Timestamp`] they obtained from
//! their own clock, which keeps planning and condition evaluation pure and
//! reproducible in tests.

use serde::Deserialize;
use serde::Serialize;

/// A point in time, expressed as milliseconds since the Unix epoch.
///
/// # Invariants
/// - Always non-negative in practice; negative values are accepted but carry
///   no defined meaning for this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps a millisecond epoch offset.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the millisecond epoch offset.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_millis() {
        let ts = Timestamp::from_unix_millis(1_700_000_000_000);
        assert_eq!(ts.as_unix_millis(), 1_700_000_000_000);
    }

    #[test]
    fn orders_chronologically() {
        let earlier = Timestamp::from_unix_millis(1);
        let later = Timestamp::from_unix_millis(2);
        assert!(earlier < later);
    }
}

// crates/reelgraph-dispatch/src/clock.rs
// ============================================================================
// Module: Reelgraph Dispatch Clock
// Description: Reads the wall clock at the one place in the engine that is
//              allowed to.
// Purpose: `reelgraph-core` stays pure and clock-free (see its `time`
//          module); the dispatcher is the actual process boundary, so it
//          stamps events and progress with real time.
// Dependencies: reelgraph-core, std
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use reelgraph_core::core::time::Timestamp;

/// The current wall-clock time, rounded down to milliseconds since the Unix
/// epoch.
#[must_use]
pub fn now() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}

// crates/reelgraph-store/src/tmp.rs
// ============================================================================
// Module: Reelgraph Temp File Naming
// Description: Per-process unique suffixes for write-then-rename temp paths.
// Purpose: Give every concurrent writer in this process a distinct temp
//          path, since the process id alone is constant across every task.
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns a suffix unique to this call, within this process. Combined with
/// [`std::process::id`], disambiguates concurrent writers targeting the same
/// final path.
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

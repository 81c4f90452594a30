// crates/reelgraph-core/src/runtime/mod.rs
// ============================================================================
// Module: Reelgraph Runtime
// Description: Pure evaluation logic shared by planning and dispatch.
// ============================================================================

pub mod condition;

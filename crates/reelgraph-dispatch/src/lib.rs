// crates/reelgraph-dispatch/src/lib.rs
// ============================================================================
// Crate: reelgraph-dispatch
// Description: Executes a layered Plan against an event log, blob store, and
//              producer, with bounded per-layer concurrency.
// ============================================================================

//! ## Overview
//! [`execute_plan`] walks a [`reelgraph_core::core::manifest::Plan`]'s layers
//! in order. Within a layer, jobs run concurrently up to
//! [`ExecuteOpts::concurrency`] permits; every job in a layer reaches a
//! terminal state before the next layer starts. A job is resolved against
//! the prior event log for upstream failures and condition evaluation before
//! its [`reelgraph_core::interfaces::Producer`] is ever called; a provider
//! failure is captured as a `Failed` artefact event and never aborts the
//! run.

mod clock;
mod execute;
mod types;

pub use execute::execute_plan;
pub use types::ExecuteOpts;
pub use types::ExecutionContext;
pub use types::RunResult;

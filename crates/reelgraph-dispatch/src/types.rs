// crates/reelgraph-dispatch/src/types.rs
// ============================================================================
// Module: Reelgraph Dispatch Types
// Description: The external collaborators a run needs, its tunables, and
//              its outcome.
// Purpose: Give `execute_plan` one bundle of backend trait objects instead
//          of a long parameter list.
// Dependencies: reelgraph-core
// ============================================================================

use std::sync::Arc;

use reelgraph_core::core::event::ArtefactStatus;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::EventLog;
use reelgraph_core::interfaces::ProgressObserver;
use reelgraph_core::interfaces::Producer;
use tokio_util::sync::CancellationToken;

/// The backend collaborators one run of `execute_plan` dispatches against.
pub struct ExecutionContext {
    /// Append-only input/artefact event logs.
    pub event_log: Arc<dyn EventLog>,
    /// Content-addressed blob storage.
    pub blob_store: Arc<dyn BlobStore>,
    /// The producer backend every scheduled job is run through.
    pub producer: Arc<dyn Producer>,
    /// Progress sink for layer/job lifecycle events.
    pub observer: Arc<dyn ProgressObserver>,
    /// Cooperative cancellation, observed before each job starts.
    pub cancellation: CancellationToken,
}

/// Tunables for one `execute_plan` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOpts {
    /// The movie this run executes against.
    pub movie_id: String,
    /// Maximum number of jobs running at once within a layer.
    pub concurrency: u32,
}

/// The outcome of running a full plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// `Failed` if any job failed; `Succeeded` otherwise. A plan with every
    /// job skipped still reports `Succeeded`.
    pub status: ArtefactStatus,
    /// Total jobs that produced a usable result.
    pub succeeded: u32,
    /// Total jobs that failed.
    pub failed: u32,
    /// Total jobs skipped (condition drop, upstream failure, cancellation,
    /// or `reRunFrom`/`upToLayer` slicing). A cache hit is dropped from the
    /// plan before execution and never counted here.
    pub skipped: u32,
    /// The revision this run produced.
    pub revision: Revision,
}

// crates/reelgraph-core/src/interfaces/mod.rs
// ============================================================================
// Module: Reelgraph Interfaces
// Description: Trait boundaries between the planning/dispatch engine and its
//              external collaborators (storage, providers, progress).
// Purpose: Keep reelgraph-dispatch and reelgraph-plan backend-agnostic; the
//          filesystem implementations live in reelgraph-store and
//          reelgraph-providers.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! The engine core never touches a filesystem or a network socket directly.
//! It is built against these trait objects, so `reelgraph-store` and
//! `reelgraph-providers` can be swapped (or faked in tests) without touching
//! `reelgraph-plan` or `reelgraph-dispatch`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::core::error::ProviderError;
use crate::core::error::RuntimeError;
use crate::core::event::ArtefactEvent;
use crate::core::event::InputEvent;
use crate::core::hashing::HashDigest;
use crate::core::job::Job;
use crate::core::manifest::CurrentPointer;
use crate::core::manifest::Manifest;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Blob Store
// ============================================================================

/// A content-addressed write-once blob reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBlob {
    /// The blob's content hash.
    pub hash: HashDigest,
    /// Size in bytes.
    pub size: u64,
}

/// A decoded blob payload, chosen by declared MIME type.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    /// `text/*` payloads, decoded as UTF-8.
    Text(String),
    /// `application/json` payloads, parsed.
    Json(Value),
    /// Anything else, returned as raw bytes.
    Bytes(Vec<u8>),
}

/// Content-addressed, write-once blob storage for one movie.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` under their SHA-256 digest, deduplicating identical
    /// content and writing atomically (temp file + rename).
    async fn write(&self, bytes: &[u8], mime_type: &str) -> Result<WrittenBlob, RuntimeError>;

    /// Reads a blob's raw bytes. `mime_type`, when known, disambiguates the
    /// on-disk extension; without it the store falls back to probing.
    async fn read(&self, hash: &HashDigest, mime_type: Option<&str>) -> Result<Vec<u8>, RuntimeError>;

    /// Reads and decodes a blob by its declared MIME type.
    async fn read_decoded(
        &self,
        hash: &HashDigest,
        mime_type: &str,
    ) -> Result<DecodedPayload, RuntimeError>;

    /// True when a blob for `hash` exists, under either its extensioned or
    /// bare filename.
    async fn exists(&self, hash: &HashDigest) -> Result<bool, RuntimeError>;
}

// ============================================================================
// SECTION: Event Log
// ============================================================================

/// Append-only input/artefact event logs for one movie.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends one input event.
    async fn append_input(&self, movie_id: &str, event: InputEvent) -> Result<(), RuntimeError>;

    /// Appends one artefact event.
    async fn append_artefact(
        &self,
        movie_id: &str,
        event: ArtefactEvent,
    ) -> Result<(), RuntimeError>;

    /// Streams every input event, oldest first, skipping malformed lines.
    /// Lazy: backed by a buffered line reader, never materializing the full
    /// log in memory.
    async fn stream_inputs(
        &self,
        movie_id: &str,
    ) -> Result<BoxStream<'static, Result<InputEvent, RuntimeError>>, RuntimeError>;

    /// Streams every artefact event, oldest first, skipping malformed lines.
    /// Lazy, for the same reason as [`EventLog::stream_inputs`].
    async fn stream_artefacts(
        &self,
        movie_id: &str,
    ) -> Result<BoxStream<'static, Result<ArtefactEvent, RuntimeError>>, RuntimeError>;

    /// The latest succeeded event per artifact id.
    async fn latest_succeeded_per_artefact(
        &self,
        movie_id: &str,
    ) -> Result<BTreeMap<String, ArtefactEvent>, RuntimeError> {
        let mut latest: BTreeMap<String, ArtefactEvent> = BTreeMap::new();
        let mut stream = self.stream_artefacts(movie_id).await?;
        while let Some(event) = stream.next().await {
            let event = event?;
            if event.is_succeeded() {
                latest.insert(event.artefact_id.clone(), event);
            }
        }
        Ok(latest)
    }

    /// The latest event per artifact id, regardless of status, used to
    /// detect upstream failures.
    async fn any_latest_per_artefact(
        &self,
        movie_id: &str,
    ) -> Result<BTreeMap<String, ArtefactEvent>, RuntimeError> {
        let mut latest: BTreeMap<String, ArtefactEvent> = BTreeMap::new();
        let mut stream = self.stream_artefacts(movie_id).await?;
        while let Some(event) = stream.next().await {
            let event = event?;
            latest.insert(event.artefact_id.clone(), event);
        }
        Ok(latest)
    }
}

// ============================================================================
// SECTION: Manifest Service
// ============================================================================

/// Point-in-time manifest snapshots, hash-chained across revisions.
#[async_trait]
pub trait ManifestService: Send + Sync {
    /// Loads `current.json` and the manifest it points to, if any.
    async fn load_current(
        &self,
        movie_id: &str,
    ) -> Result<Option<(Manifest, HashDigest)>, RuntimeError>;

    /// Saves a new manifest, checking `previous_hash` against the on-disk
    /// predecessor before writing, then atomically rotates `current.json`.
    async fn save_manifest(
        &self,
        movie_id: &str,
        manifest: &Manifest,
        previous_hash: Option<&HashDigest>,
    ) -> Result<HashDigest, RuntimeError>;

    /// Rebuilds a manifest purely from the event logs, for crash recovery
    /// and replay-determinism checks.
    async fn rebuild_from_events(&self, movie_id: &str) -> Result<Manifest, RuntimeError>;

    /// Reads the raw `current.json` pointer without resolving the manifest.
    async fn read_pointer(&self, movie_id: &str) -> Result<CurrentPointer, RuntimeError>;
}

// ============================================================================
// SECTION: Producer Interface
// ============================================================================

/// A request to run one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    /// The movie this job belongs to.
    pub movie_id: String,
    /// The job to execute.
    pub job: Job,
    /// The plan layer this job belongs to.
    pub layer_index: u32,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// The revision this run is producing.
    pub revision: String,
}

/// One artefact produced by a `produce` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedArtefact {
    /// The artifact id this output belongs to.
    pub artefact_id: String,
    /// Its outcome.
    pub status: crate::core::event::ArtefactStatus,
    /// The produced payload, present only when `status == Succeeded`.
    pub blob: Option<ProducedBlob>,
    /// Free-form diagnostics, present on failure or skip.
    pub diagnostics: Option<String>,
}

/// A payload returned by a producer, not yet written to the blob store.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedBlob {
    /// The raw or encoded payload.
    pub data: ProducedData,
    /// Declared MIME type.
    pub mime_type: String,
}

/// The wire shape a producer may return its payload as.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducedData {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Structured JSON.
    Json(Value),
}

/// The overall outcome of one `produce` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProduceResult {
    /// Overall status for the job.
    pub status: crate::core::event::ArtefactStatus,
    /// Per-artifact outcomes.
    pub artefacts: Vec<ProducedArtefact>,
}

/// The uniform call boundary to external handlers (LLM prompts, image/audio/
/// video generators, timeline composers, exporters).
///
/// Implementations never propagate errors as [`EngineError`](crate::core::error::EngineError);
/// a failure is reported as `Ok` with a `Failed` status, captured as an
/// artefact event by the dispatcher.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Executes one job and returns its outcome.
    async fn produce(&self, request: ProduceRequest) -> Result<ProduceResult, ProviderError>;
}

// ============================================================================
// SECTION: Progress Observer
// ============================================================================

/// A progress event emitted by the dispatcher as a run proceeds.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A layer began executing.
    LayerStart {
        /// Zero-based layer index.
        layer_index: u32,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
    /// A layer was skipped entirely, e.g. below a `reRunFrom` cut.
    LayerSkipped {
        /// Zero-based layer index.
        layer_index: u32,
        /// Why it was skipped.
        reason: String,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
    /// A layer finished; every job in it reached a terminal state.
    LayerComplete {
        /// Zero-based layer index.
        layer_index: u32,
        /// Jobs that succeeded.
        succeeded: u32,
        /// Jobs that failed.
        failed: u32,
        /// Jobs that were skipped.
        skipped: u32,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
    /// One job began executing.
    JobStart {
        /// The job id.
        job_id: String,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
    /// One job reached a terminal state.
    JobComplete {
        /// The job id.
        job_id: String,
        /// Its outcome.
        status: crate::core::event::ArtefactStatus,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
    /// The whole run finished.
    ExecutionComplete {
        /// Final run status.
        status: crate::core::event::ArtefactStatus,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
    /// A non-fatal error worth surfacing to an operator.
    Error {
        /// Stable error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// When this event was emitted.
        timestamp: Timestamp,
    },
}

/// Receives [`ProgressEvent`]s as a run proceeds.
///
/// Implementations must not block the dispatcher for long; the default
/// CLI implementation logs via `tracing` and returns immediately.
pub trait ProgressObserver: Send + Sync {
    /// Handles one progress event.
    fn on_event(&self, event: ProgressEvent);
}

/// A [`ProgressObserver`] that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_event(&self, _event: ProgressEvent) {}
}

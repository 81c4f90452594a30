// system-tests/src/lib.rs
// ============================================================================
// Crate: system-tests
// Description: Shared harness for end-to-end scenarios spanning the
//              expander, planner, store, and dispatcher.
// ============================================================================

//! ## Overview
//! [`Harness`] wires a temporary movie directory to real [`reelgraph_store`]
//! backends, so a test can expand a blueprint, plan against the movie's
//! current manifest, execute the plan, and assert on what actually landed
//! on disk, the same way a deployed CLI run would.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use reelgraph_core::core::event::InputEvent;
use reelgraph_core::core::hashing::hash_canonical_json;
use reelgraph_core::core::job::Job;
use reelgraph_core::core::manifest::Manifest;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::core::manifest::RunConfig;
use reelgraph_core::core::time::Timestamp;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::EventLog;
use reelgraph_core::interfaces::ManifestService;
use reelgraph_core::interfaces::NullObserver;
use reelgraph_core::interfaces::Producer;
use reelgraph_dispatch::ExecuteOpts;
use reelgraph_dispatch::ExecutionContext;
use reelgraph_dispatch::RunResult;
use reelgraph_dispatch::execute_plan;
use reelgraph_providers::SimulatedProducer;
use reelgraph_store::FsBlobStore;
use reelgraph_store::FsEventLog;
use reelgraph_store::FsManifestService;
use reelgraph_store::MoviePaths;
use reelgraph_store::initialize_movie_storage;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A movie's storage wired up to real filesystem backends under a temporary
/// directory, torn down when the harness drops.
pub struct Harness {
    /// Keeps the backing directory alive for the harness's lifetime.
    _tempdir: tempfile::TempDir,
    /// The movie this harness drives.
    pub movie_id: String,
    /// Append-only input/artefact event logs.
    pub event_log: Arc<dyn EventLog>,
    /// Content-addressed blob storage.
    pub blob_store: Arc<dyn BlobStore>,
    /// Hash-chained manifest persistence.
    pub manifest_service: FsManifestService,
}

impl Harness {
    /// Opens a fresh, empty movie directory.
    pub async fn open(movie_id: &str) -> Self {
        let tempdir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let paths = MoviePaths::new(tempdir.path(), "movies", movie_id);
        initialize_movie_storage(&paths).await.unwrap_or_else(|err| panic!("init storage: {err}"));
        let event_log: Arc<dyn EventLog> = Arc::new(FsEventLog::new(paths.events_dir()));
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(paths.blobs_dir()));
        let manifest_service = FsManifestService::new(paths.root.clone(), Arc::clone(&event_log));
        Self { _tempdir: tempdir, movie_id: movie_id.to_string(), event_log, blob_store, manifest_service }
    }

    /// The movie's current manifest plus its on-disk content hash, or an
    /// empty manifest at [`Revision::INITIAL`] with no hash when nothing has
    /// been saved yet.
    pub async fn base_manifest(&self) -> (Manifest, Option<reelgraph_core::core::hashing::HashDigest>) {
        match self.manifest_service.load_current(&self.movie_id).await {
            Ok(Some((manifest, hash))) => (manifest, Some(hash)),
            _ => (
                Manifest {
                    revision: Revision::INITIAL,
                    base_revision: None,
                    created_at: Timestamp::from_unix_millis(0),
                    inputs: BTreeMap::new(),
                    artefacts: BTreeMap::new(),
                    run_config: None,
                },
                None,
            ),
        }
    }

    /// Records one changed input value and returns its canonical id, for
    /// building a `changed_input_ids` set to pass to `build_plan`.
    pub async fn record_input(&self, name: &str, value: Value) -> String {
        let id = if name.starts_with("Input:") { name.to_string() } else { format!("Input:{name}") };
        let digest = hash_canonical_json(&value);
        self.event_log
            .append_input(
                &self.movie_id,
                InputEvent {
                    id: id.clone(),
                    payload: value,
                    payload_digest: digest,
                    revision: "pending".to_string(),
                    created_at: Timestamp::from_unix_millis(0),
                },
            )
            .await
            .unwrap_or_else(|err| panic!("append_input: {err}"));
        id
    }

    /// Runs `jobs` to completion against `base_manifest`'s revision, using
    /// `concurrency` permits per layer and the given mock producer.
    pub async fn plan_and_run(
        &self,
        jobs: &[Job],
        base_manifest: &Manifest,
        changed_input_ids: &BTreeSet<String>,
        run_config: &RunConfig,
        producer: Arc<dyn Producer>,
        concurrency: u32,
    ) -> (reelgraph_core::core::manifest::Plan, RunResult) {
        let plan = reelgraph_plan::build_plan(
            jobs,
            base_manifest,
            changed_input_ids,
            run_config,
            Timestamp::from_unix_millis(0),
        )
        .unwrap_or_else(|err| panic!("build_plan: {err}"));

        let ctx = ExecutionContext {
            event_log: Arc::clone(&self.event_log),
            blob_store: Arc::clone(&self.blob_store),
            producer,
            observer: Arc::new(NullObserver),
            cancellation: CancellationToken::new(),
        };
        let opts = ExecuteOpts { movie_id: self.movie_id.clone(), concurrency };
        let result = execute_plan(&plan, &ctx, &opts).await.unwrap_or_else(|err| panic!("execute_plan: {err}"));
        (plan, result)
    }

    /// Rebuilds a manifest from the event log, overriding its revision with
    /// the plan's own advanced revision, then saves it as the movie's new
    /// current manifest. Mirrors what `reelgraph-cli` does after a run.
    pub async fn persist_manifest(
        &self,
        plan: &reelgraph_core::core::manifest::Plan,
        base_manifest: &Manifest,
        previous_hash: Option<&reelgraph_core::core::hashing::HashDigest>,
    ) -> Manifest {
        let mut manifest = self
            .manifest_service
            .rebuild_from_events(&self.movie_id)
            .await
            .unwrap_or_else(|err| panic!("rebuild_from_events: {err}"));
        manifest.revision = plan.revision;
        manifest.base_revision = if base_manifest.revision == Revision::INITIAL && previous_hash.is_none() {
            None
        } else {
            Some(base_manifest.revision)
        };
        self.manifest_service
            .save_manifest(&self.movie_id, &manifest, previous_hash)
            .await
            .unwrap_or_else(|err| panic!("save_manifest: {err}"));
        manifest
    }

    /// A `Producer` that never fails, for scenarios that don't exercise
    /// failure handling.
    #[must_use]
    pub fn simulated_producer() -> Arc<dyn Producer> {
        Arc::new(SimulatedProducer::new())
    }
}

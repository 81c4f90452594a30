// demos/minimal/src/main.rs
// ============================================================================
// Module: Reelgraph Minimal Example
// Description: Minimal end-to-end reelgraph run using filesystem storage and
//              the simulated producer.
// Purpose: Demonstrate expand -> plan -> execute -> manifest persistence.
// Dependencies: reelgraph-core, reelgraph-expand, reelgraph-plan,
//               reelgraph-dispatch, reelgraph-store, reelgraph-providers
// ============================================================================

//! ## Overview
//! Builds a one-producer blueprint (`Greeter` produces `Artifact:Greeter.Line`),
//! expands it, plans a fresh run, executes it against a temporary movie
//! directory, and prints the resulting manifest summary. No blueprint
//! parser, provider handler, or HTTP surface is involved; all of those are
//! out of scope for this engine.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use reelgraph_core::core::blueprint::ArtifactDecl;
use reelgraph_core::core::blueprint::BlueprintNode;
use reelgraph_core::core::blueprint::ModelHint;
use reelgraph_core::core::blueprint::ProducerDecl;
use reelgraph_core::core::manifest::Manifest;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::core::manifest::RunConfig;
use reelgraph_core::core::time::Timestamp;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::EventLog;
use reelgraph_core::interfaces::ManifestService;
use reelgraph_core::interfaces::NullObserver;
use reelgraph_dispatch::ExecuteOpts;
use reelgraph_dispatch::ExecutionContext;
use reelgraph_dispatch::execute_plan;
use reelgraph_providers::SimulatedProducer;
use reelgraph_store::FsBlobStore;
use reelgraph_store::FsEventLog;
use reelgraph_store::FsManifestService;
use reelgraph_store::MoviePaths;
use reelgraph_store::initialize_movie_storage;

fn build_blueprint() -> BlueprintNode {
    let mut root = BlueprintNode::default();
    root.producers.push(ProducerDecl {
        name: "Greeter".to_string(),
        inputs: Vec::new(),
        produces: vec!["Line".to_string()],
        model: ModelHint::default(),
        loop_membership: Vec::new(),
    });
    root.artifacts.push(ArtifactDecl { name: "Line".to_string(), mime_type: Some("application/json".to_string()) });
    root
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let movie_id = "demo-minimal";
    let paths = MoviePaths::new(tempdir.path(), "movies", movie_id);
    initialize_movie_storage(&paths).await?;

    let event_log: Arc<dyn EventLog> = Arc::new(FsEventLog::new(paths.events_dir()));
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(paths.blobs_dir()));
    let manifest_service = FsManifestService::new(paths.root.clone(), Arc::clone(&event_log));

    let blueprint = build_blueprint();
    let jobs = reelgraph_expand::expand(&blueprint, &BTreeMap::new())?;

    let base_manifest = Manifest {
        revision: Revision::INITIAL,
        base_revision: None,
        created_at: Timestamp::from_unix_millis(0),
        inputs: BTreeMap::new(),
        artefacts: BTreeMap::new(),
        run_config: None,
    };

    let plan = reelgraph_plan::build_plan(
        &jobs,
        &base_manifest,
        &BTreeSet::new(),
        &RunConfig::default(),
        Timestamp::from_unix_millis(0),
    )?;
    println!("planned {} job(s) across {} layer(s)", jobs.len(), plan.layers.len());

    let ctx = ExecutionContext {
        event_log: Arc::clone(&event_log),
        blob_store: Arc::clone(&blob_store),
        producer: Arc::new(SimulatedProducer::new()),
        observer: Arc::new(NullObserver),
        cancellation: tokio_util::sync::CancellationToken::new(),
    };
    let opts = ExecuteOpts { movie_id: movie_id.to_string(), concurrency: 2 };
    let result = execute_plan(&plan, &ctx, &opts).await?;
    println!(
        "run {:?}: {} succeeded, {} failed, {} skipped",
        result.status, result.succeeded, result.failed, result.skipped
    );

    let mut manifest = manifest_service.rebuild_from_events(movie_id).await?;
    manifest.revision = plan.revision;
    manifest.base_revision = None;
    manifest_service.save_manifest(movie_id, &manifest, None).await?;

    for (artefact_id, entry) in &manifest.artefacts {
        println!("artefact {artefact_id}: {:?}", entry.status);
    }

    Ok(())
}

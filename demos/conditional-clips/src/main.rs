// demos/conditional-clips/src/main.rs
// ============================================================================
// Module: Reelgraph Conditional Clips Example
// Description: Loop fanout with a per-segment condition gating whether each
//              segment's image-generation job runs.
// Purpose: Demonstrate the condition evaluator deciding, per fanned-out job,
//          whether a declared input is materialized or the job is skipped.
// Dependencies: reelgraph-core, reelgraph-expand, reelgraph-plan,
//               reelgraph-dispatch, reelgraph-store, reelgraph-providers
// ============================================================================

//! ## Overview
//! `Doc` produces one `Script` artifact describing three segments, each
//! tagged with a narration type. `Img` fans out over the `Segments` loop and
//! consumes `Script`, but only when its own segment's `Type` reads
//! `"ImageNarration"`; the other segments are skipped with a diagnostic
//! rather than materializing a mismatched input.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use reelgraph_core::core::blueprint::ArtifactDecl;
use reelgraph_core::core::blueprint::BlueprintNode;
use reelgraph_core::core::blueprint::ConditionClause;
use reelgraph_core::core::blueprint::ConditionExpr;
use reelgraph_core::core::blueprint::ConnectionDecl;
use reelgraph_core::core::blueprint::CountInputRef;
use reelgraph_core::core::blueprint::Endpoint;
use reelgraph_core::core::blueprint::InputDecl;
use reelgraph_core::core::blueprint::LoopDecl;
use reelgraph_core::core::blueprint::ModelHint;
use reelgraph_core::core::blueprint::ProducerDecl;
use reelgraph_core::core::manifest::Manifest;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::core::manifest::RunConfig;
use reelgraph_core::core::time::Timestamp;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::EventLog;
use reelgraph_core::interfaces::NullObserver;
use reelgraph_dispatch::ExecuteOpts;
use reelgraph_dispatch::ExecutionContext;
use reelgraph_dispatch::execute_plan;
use reelgraph_providers::SimulatedProducer;
use reelgraph_store::FsBlobStore;
use reelgraph_store::FsEventLog;
use reelgraph_store::MoviePaths;
use reelgraph_store::initialize_movie_storage;
use serde_json::json;

fn build_blueprint() -> BlueprintNode {
    let mut root = BlueprintNode::default();
    root.inputs.push(InputDecl { name: "SegmentCount".to_string(), default: None });
    root.loops.push(LoopDecl {
        name: "Segments".to_string(),
        count: CountInputRef { count_input: "SegmentCount".to_string() },
    });

    root.producers.push(ProducerDecl {
        name: "Doc".to_string(),
        inputs: Vec::new(),
        produces: vec!["Script".to_string()],
        model: ModelHint::default(),
        loop_membership: Vec::new(),
    });
    root.artifacts.push(ArtifactDecl { name: "Script".to_string(), mime_type: Some("application/json".to_string()) });

    root.producers.push(ProducerDecl {
        name: "Img".to_string(),
        inputs: vec!["Script".to_string()],
        produces: vec!["Out".to_string()],
        model: ModelHint::default(),
        loop_membership: vec!["Segments".to_string()],
    });
    root.artifacts.push(ArtifactDecl { name: "Out".to_string(), mime_type: Some("application/json".to_string()) });

    root.connections.push(ConnectionDecl {
        source: Endpoint { reference: "Script".to_string(), dims: Vec::new() },
        target: Endpoint { reference: "Img.Script".to_string(), dims: Vec::new() },
        condition: Some(ConditionExpr::Clause(ConditionClause {
            when: "Doc.Script.Segments[Segments].Type".to_string(),
            is: Some(json!("ImageNarration")),
            is_not: None,
            contains: None,
            greater_than: None,
            less_than: None,
            greater_or_equal: None,
            less_or_equal: None,
            exists: None,
            matches: None,
        })),
    });

    root
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    let movie_id = "demo-conditional-clips";
    let paths = MoviePaths::new(tempdir.path(), "movies", movie_id);
    initialize_movie_storage(&paths).await?;

    let event_log: Arc<dyn EventLog> = Arc::new(FsEventLog::new(paths.events_dir()));
    let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(paths.blobs_dir()));

    let blueprint = build_blueprint();
    let mut inputs = BTreeMap::new();
    inputs.insert("SegmentCount".to_string(), json!(3));
    let jobs = reelgraph_expand::expand(&blueprint, &inputs)?;

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

    let producer = Arc::new(SimulatedProducer::new().with_alternating(
        "Doc.Script",
        vec![json!({
            "Segments": [
                {"Type": "ImageNarration"},
                {"Type": "TalkingHead"},
                {"Type": "ImageNarration"},
            ]
        })],
    ));

    let ctx = ExecutionContext {
        event_log: Arc::clone(&event_log),
        blob_store: Arc::clone(&blob_store),
        producer,
        observer: Arc::new(NullObserver),
        cancellation: tokio_util::sync::CancellationToken::new(),
    };
    let opts = ExecuteOpts { movie_id: movie_id.to_string(), concurrency: 3 };
    let result = execute_plan(&plan, &ctx, &opts).await?;

    println!(
        "segments: 3, image-narration jobs succeeded: {}, skipped: {}",
        result.succeeded, result.skipped
    );
    let mut artefacts = event_log.stream_artefacts(movie_id).await?;
    while let Some(event) = futures::StreamExt::next(&mut artefacts).await {
        let event = event?;
        println!("{}: {:?}", event.artefact_id, event.status);
    }

    Ok(())
}

// system-tests/tests/end_to_end.rs
// ============================================================================
// Module: Reelgraph End-to-End Scenarios
// Description: Full-stack scenarios spanning expansion, planning, storage,
//              and dispatch against a real filesystem movie directory.
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use reelgraph_core::core::blueprint::ConditionClause;
use reelgraph_core::core::blueprint::ConditionExpr;
use reelgraph_core::core::blueprint::ModelHint;
use reelgraph_core::core::error::ProviderError;
use reelgraph_core::core::event::ArtefactStatus;
use reelgraph_core::core::job::FanIn;
use reelgraph_core::core::job::InputCondition;
use reelgraph_core::core::job::Job;
use reelgraph_core::core::manifest::RunConfig;
use reelgraph_core::interfaces::ProduceRequest;
use reelgraph_core::interfaces::ProduceResult;
use reelgraph_core::interfaces::ProducedArtefact;
use reelgraph_core::interfaces::ProducedBlob;
use reelgraph_core::interfaces::ProducedData;
use reelgraph_core::interfaces::Producer;
use reelgraph_providers::SimulatedProducer;
use serde_json::json;
use system_tests::Harness;

fn job(id: &str, produces: &[&str], declared_inputs: &[&str]) -> Job {
    Job {
        job_id: id.to_string(),
        producer_name: id.trim_start_matches("Producer:").to_string(),
        layer_hint: 0,
        model: ModelHint::default(),
        declared_inputs: declared_inputs.iter().map(|s| (*s).to_string()).collect(),
        produces: produces.iter().map(|s| (*s).to_string()).collect(),
        input_bindings: BTreeMap::new(),
        input_conditions: BTreeMap::new(),
        fan_in: BTreeMap::new(),
        dimension_indices: BTreeMap::new(),
    }
}

/// Scenario A — simple 2-layer, fresh movie: `P` at layer 0 produces
/// `Artifact:P.X`; `Q` at layer 1 consumes it and produces `Artifact:Q.Y`.
#[tokio::test]
async fn scenario_a_two_layer_fresh_movie() {
    let harness = Harness::open("movie-a").await;
    let (base_manifest, previous_hash) = harness.base_manifest().await;

    let jobs = vec![
        job("Producer:P", &["Artifact:P.X"], &[]),
        job("Producer:Q", &["Artifact:Q.Y"], &["Artifact:P.X"]),
    ];

    let (plan, result) = harness
        .plan_and_run(
            &jobs,
            &base_manifest,
            &BTreeSet::new(),
            &RunConfig::default(),
            Harness::simulated_producer(),
            4,
        )
        .await;

    assert_eq!(plan.layers.len(), 2);
    assert_eq!(plan.layers[0].len(), 1);
    assert_eq!(plan.layers[1].len(), 1);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(plan.revision.to_string(), "rev-0001");

    let manifest = harness.persist_manifest(&plan, &base_manifest, previous_hash.as_ref()).await;
    assert_eq!(manifest.artefacts.len(), 2);
    assert!(manifest.artefacts["Artifact:P.X"].blob.is_some());
    assert!(manifest.artefacts["Artifact:Q.Y"].blob.is_some());

    let pointer = harness.manifest_service.read_pointer(&harness.movie_id).await.unwrap_or_else(|err| panic!("{err}"));
    assert_eq!(pointer.manifest_path.as_deref(), Some("manifests/rev-0001.json"));
}

/// Scenario B — incremental re-run: one input edited that only `Q` reads,
/// so layer 0 is a cache hit and only `Q` is scheduled.
#[tokio::test]
async fn scenario_b_incremental_rerun_cache_hits_upstream() {
    let harness = Harness::open("movie-b").await;

    let jobs = vec![
        job("Producer:P", &["Artifact:P.X"], &[]),
        job("Producer:Q", &["Artifact:Q.Y"], &["Artifact:P.X", "Input:Seed"]),
    ];

    let (base1, prev1) = harness.base_manifest().await;
    harness.record_input("Seed", json!(1)).await;
    let (plan1, _) = harness
        .plan_and_run(&jobs, &base1, &BTreeSet::new(), &RunConfig::default(), Harness::simulated_producer(), 4)
        .await;
    let manifest1 = harness.persist_manifest(&plan1, &base1, prev1.as_ref()).await;
    let original_x_hash = manifest1.artefacts["Artifact:P.X"].blob.clone().unwrap_or_else(|| panic!("blob"));

    let (base2, prev2) = harness.base_manifest().await;
    let changed_id = harness.record_input("Seed", json!(2)).await;
    let mut changed = BTreeSet::new();
    changed.insert(changed_id);

    let (plan2, result2) = harness
        .plan_and_run(&jobs, &base2, &changed, &RunConfig::default(), Harness::simulated_producer(), 4)
        .await;

    assert!(plan2.layers[0].is_empty());
    assert!(matches!(&plan2.layers[1][0], reelgraph_core::core::job::PlannedJob::Scheduled(_)));
    assert_eq!(result2.succeeded, 1);
    assert_eq!(result2.skipped, 0);

    let manifest2 = harness.persist_manifest(&plan2, &base2, prev2.as_ref()).await;
    assert_eq!(manifest2.base_revision, Some(manifest1.revision));
    assert_eq!(manifest2.artefacts["Artifact:P.X"].blob, Some(original_x_hash));
}

/// Scenario C — fanout with conditional skip: three segments, the middle
/// one's `NarrationType` condition is unsatisfied, so only two of three
/// jobs produce a blob and the third is skipped with no manifest entry.
#[tokio::test]
async fn scenario_c_fanout_with_conditional_skip() {
    let harness = Harness::open("movie-c").await;
    let (base_manifest, _) = harness.base_manifest().await;

    let doc = job("Producer:Doc", &["Artifact:Doc.Script"], &[]);

    let segment_types = ["ImageNarration", "TalkingHead", "ImageNarration"];
    let mut jobs = vec![doc];
    for (seg, expected_type) in segment_types.iter().enumerate() {
        let mut img = job(
            &format!("Producer:Img[{seg}]"),
            &[&format!("Artifact:Img.Out[{seg}]")],
            &["Artifact:Doc.Script"],
        );
        img.dimension_indices.insert("Segments".to_string(), seg as u32);
        img.input_conditions.insert(
            "Artifact:Doc.Script".to_string(),
            InputCondition {
                condition: ConditionExpr::Clause(ConditionClause {
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
                }),
                dim_indices: img.dimension_indices.clone(),
            },
        );
        let _ = expected_type;
        jobs.push(img);
    }

    let producer = Arc::new(
        SimulatedProducer::new().with_alternating(
            "Doc.Script",
            vec![json!({
                "Segments": [
                    {"Type": "ImageNarration"},
                    {"Type": "TalkingHead"},
                    {"Type": "ImageNarration"},
                ]
            })],
        ),
    );

    let (plan, result) = harness
        .plan_and_run(&jobs, &base_manifest, &BTreeSet::new(), &RunConfig::default(), producer, 4)
        .await;

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.skipped, 1);

    let manifest = harness.persist_manifest(&plan, &base_manifest, None).await;
    assert!(manifest.artefacts["Artifact:Img.Out[0]"].blob.is_some());
    assert!(manifest.artefacts["Artifact:Img.Out[2]"].blob.is_some());
    assert_eq!(manifest.artefacts["Artifact:Img.Out[1]"].status, ArtefactStatus::Skipped);
    assert!(manifest.artefacts["Artifact:Img.Out[1]"].blob.is_none());
}

/// A producer that counts concurrently in-flight calls and reports the
/// observed peak, for asserting bounded concurrency (Scenario D).
struct ConcurrencyProbe {
    in_flight: AtomicU32,
    peak: AtomicU32,
}

impl ConcurrencyProbe {
    fn new() -> Self {
        Self { in_flight: AtomicU32::new(0), peak: AtomicU32::new(0) }
    }

    fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Producer for ConcurrencyProbe {
    async fn produce(&self, request: ProduceRequest) -> Result<ProduceResult, ProviderError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let artefacts = request
            .job
            .produces
            .iter()
            .map(|artefact_id| ProducedArtefact {
                artefact_id: artefact_id.clone(),
                status: ArtefactStatus::Succeeded,
                blob: Some(ProducedBlob { data: ProducedData::Json(json!(true)), mime_type: "application/json".to_string() }),
                diagnostics: None,
            })
            .collect();
        Ok(ProduceResult { status: ArtefactStatus::Succeeded, artefacts })
    }
}

/// Scenario D — concurrency <= limit: 5 independent jobs in one layer with
/// `concurrency=2` never run more than 2 at once, and all 5 complete.
#[tokio::test]
async fn scenario_d_concurrency_is_bounded() {
    let harness = Harness::open("movie-d").await;
    let (base_manifest, _) = harness.base_manifest().await;

    let jobs: Vec<Job> =
        (0..5).map(|i| job(&format!("Producer:W[{i}]"), &[&format!("Artifact:W.Out[{i}]")], &[])).collect();

    let probe = Arc::new(ConcurrencyProbe::new());
    let (_, result) = harness
        .plan_and_run(&jobs, &base_manifest, &BTreeSet::new(), &RunConfig::default(), probe.clone(), 2)
        .await;

    assert_eq!(result.succeeded, 5);
    assert!(probe.peak() <= 2, "observed peak concurrency {}", probe.peak());
}

/// Scenario E — upstream failure cascade: `A` fails, so `B` and `C` (both
/// consumers of `A`'s artifact) are skipped with an `upstream failure`
/// reason, and the run status is `failed`.
#[tokio::test]
async fn scenario_e_upstream_failure_cascades() {
    let harness = Harness::open("movie-e").await;
    let (base_manifest, _) = harness.base_manifest().await;

    let jobs = vec![
        job("Producer:A", &["Artifact:A.X"], &[]),
        job("Producer:B", &["Artifact:B.Y"], &["Artifact:A.X"]),
        job("Producer:C", &["Artifact:C.Z"], &["Artifact:A.X"]),
    ];

    let producer = Arc::new(SimulatedProducer::new().always_fail("A.X", "simulated upstream failure"));
    let (_, result) = harness
        .plan_and_run(&jobs, &base_manifest, &BTreeSet::new(), &RunConfig::default(), producer, 4)
        .await;

    assert_eq!(result.status, ArtefactStatus::Failed);
    assert_eq!(result.failed, 1);
    assert_eq!(result.skipped, 2);
}

/// Scenario F — user edit + re-run stability: after run 1, the blob behind
/// `Artifact:P.X` is overwritten by an edit event. Neither `P` nor `Q` is
/// dirty in run 2 (no input changed), so both cache-hit and are dropped
/// from the plan entirely; rebuilding the manifest still surfaces the
/// edited bytes via the event log's latest-event lookup, not the original
/// producer output.
#[tokio::test]
async fn scenario_f_user_edit_is_observed_on_rerun() {
    let harness = Harness::open("movie-f").await;

    let jobs = vec![
        job("Producer:P", &["Artifact:P.X"], &[]),
        job("Producer:Q", &["Artifact:Q.Y"], &["Artifact:P.X"]),
    ];

    let (base1, prev1) = harness.base_manifest().await;
    let (plan1, _) = harness
        .plan_and_run(&jobs, &base1, &BTreeSet::new(), &RunConfig::default(), Harness::simulated_producer(), 4)
        .await;
    let manifest1 = harness.persist_manifest(&plan1, &base1, prev1.as_ref()).await;
    let original_blob = manifest1.artefacts["Artifact:P.X"].blob.clone().unwrap_or_else(|| panic!("blob"));

    let edited_bytes = br#"{"edited":true}"#;
    let written = harness
        .blob_store
        .write(edited_bytes, "application/json")
        .await
        .unwrap_or_else(|err| panic!("write edited blob: {err}"));
    assert_ne!(written.hash, original_blob.hash);

    harness
        .event_log
        .append_artefact(
            &harness.movie_id,
            reelgraph_core::core::event::ArtefactEvent {
                artefact_id: "Artifact:P.X".to_string(),
                revision: manifest1.revision.to_string(),
                inputs_hash: reelgraph_core::core::hashing::hash_canonical_json(&json!([])),
                output: Some(reelgraph_core::core::event::BlobRef {
                    hash: written.hash.clone(),
                    size: written.size,
                    mime_type: "application/json".to_string(),
                }),
                status: ArtefactStatus::Succeeded,
                produced_by: "Producer:P".to_string(),
                created_at: reelgraph_core::core::time::Timestamp::from_unix_millis(0),
                edited_by: Some("user-1".to_string()),
                original_hash: Some(original_blob.hash.clone()),
            },
        )
        .await
        .unwrap_or_else(|err| panic!("append edit: {err}"));

    let (base2, prev2) = harness.base_manifest().await;
    let latest = harness
        .event_log
        .latest_succeeded_per_artefact(&harness.movie_id)
        .await
        .unwrap_or_else(|err| panic!("{err}"));
    assert_eq!(
        latest["Artifact:P.X"].output.as_ref().map(|b| &b.hash),
        Some(&written.hash),
        "event log's latest succeeded event for P.X should be the edit, not the original produce"
    );

    let (plan2, result2) = harness
        .plan_and_run(&jobs, &base2, &BTreeSet::new(), &RunConfig::default(), Harness::simulated_producer(), 4)
        .await;
    assert!(plan2.layers[0].is_empty());
    assert!(plan2.layers[1].is_empty());
    assert_eq!(result2.succeeded, 0);
    assert_eq!(result2.skipped, 0);

    let manifest2 = harness.persist_manifest(&plan2, &base2, prev2.as_ref()).await;
    assert_eq!(
        manifest2.artefacts["Artifact:P.X"].blob.as_ref().map(|b| &b.hash),
        Some(&written.hash)
    );
    assert_eq!(manifest2.artefacts["Artifact:P.X"].edited_by.as_deref(), Some("user-1"));
}

/// Fan-in jobs surface their members in plan order, independent of dispatch
/// — a sanity check that the harness's hand-built `Job`s exercise
/// `FanIn` the same way the expander's own output does.
#[test]
fn fan_in_job_carries_every_member() {
    let mut assembler = job("Producer:Assembler", &["Artifact:Assembler.Full"], &["Artifact:Seg.Out"]);
    assembler.fan_in.insert(
        "Artifact:Seg.Out".to_string(),
        FanIn { members: vec!["Artifact:Seg.Out[0]".to_string(), "Artifact:Seg.Out[1]".to_string()] },
    );
    assert!(assembler.has_fan_in());
    assert_eq!(assembler.fan_in["Artifact:Seg.Out"].members.len(), 2);
}

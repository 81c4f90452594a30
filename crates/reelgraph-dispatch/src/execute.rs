// crates/reelgraph-dispatch/src/execute.rs
// ============================================================================
// Module: Reelgraph Plan Executor
// Description: Runs a layered Plan's jobs against the event log, blob store,
//              and producer, honoring conditions, upstream failures, and
//              cooperative cancellation.
// Purpose: The one place the engine calls out to an external `Producer`.
// Dependencies: reelgraph-core, reelgraph-store, tokio, futures
// ============================================================================

//! ## Overview
//! Layers run strictly in order; within a layer, scheduled jobs run
//! concurrently behind a [`tokio::sync::Semaphore`] sized to
//! [`ExecuteOpts::concurrency`], and the dispatcher awaits every job in the
//! layer (`futures::future::join_all`) before starting the next. A skipped
//! job (from plan slicing, a dropped condition, or an upstream failure)
//! still gets one `Skipped` event per produced artifact, so the manifest
//! stays a complete record of every declared artifact's latest outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use reelgraph_core::core::blueprint::ConditionExpr;
use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::event::ArtefactEvent;
use reelgraph_core::core::event::ArtefactStatus;
use reelgraph_core::core::event::BlobRef;
use reelgraph_core::core::hashing::hash_canonical_json;
use reelgraph_core::core::job::Job;
use reelgraph_core::core::job::PlannedJob;
use reelgraph_core::core::manifest::Plan;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::interfaces::DecodedPayload;
use reelgraph_core::interfaces::ProduceRequest;
use reelgraph_core::interfaces::ProducedData;
use reelgraph_core::interfaces::ProgressEvent;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::clock::now;
use crate::types::ExecuteOpts;
use crate::types::ExecutionContext;
use crate::types::RunResult;

/// The terminal outcome of one dispatched job, used to roll up layer and run
/// totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    /// At least one produced artefact succeeded and none failed.
    Succeeded,
    /// At least one produced artefact failed.
    Failed,
    /// Every produced artefact was skipped.
    Skipped,
}

/// Executes `plan` to completion against `ctx`.
///
/// # Errors
///
/// Returns [`RuntimeError`] only for failures in the event log or blob store
/// itself (a corrupt log, a full disk); a provider failure is never
/// propagated here, it is recorded as a `Failed` artefact event instead.
pub async fn execute_plan(
    plan: &Plan,
    ctx: &ExecutionContext,
    opts: &ExecuteOpts,
) -> Result<RunResult, RuntimeError> {
    let semaphore = Semaphore::new(opts.concurrency.max(1) as usize);

    let mut succeeded = 0u32;
    let mut failed = 0u32;
    let mut skipped = 0u32;

    for (layer_index, layer) in plan.layers.iter().enumerate() {
        let layer_index = u32::try_from(layer_index).unwrap_or(u32::MAX);

        if ctx.cancellation.is_cancelled() {
            ctx.observer.on_event(ProgressEvent::LayerSkipped {
                layer_index,
                reason: "cancelled".to_string(),
                timestamp: now(),
            });
            for planned in layer {
                record_terminal(ctx, opts, plan.revision, planned.job(), ArtefactStatus::Skipped, "cancelled")
                    .await?;
                skipped += 1;
            }
            continue;
        }

        ctx.observer.on_event(ProgressEvent::LayerStart { layer_index, timestamp: now() });

        let outcomes = futures::future::join_all(
            layer.iter().map(|planned| dispatch_one(ctx, opts, plan.revision, layer_index, planned, &semaphore)),
        )
        .await;

        let mut layer_succeeded = 0u32;
        let mut layer_failed = 0u32;
        let mut layer_skipped = 0u32;
        for outcome in outcomes {
            match outcome? {
                JobOutcome::Succeeded => layer_succeeded += 1,
                JobOutcome::Failed => layer_failed += 1,
                JobOutcome::Skipped => layer_skipped += 1,
            }
        }
        succeeded += layer_succeeded;
        failed += layer_failed;
        skipped += layer_skipped;

        ctx.observer.on_event(ProgressEvent::LayerComplete {
            layer_index,
            succeeded: layer_succeeded,
            failed: layer_failed,
            skipped: layer_skipped,
            timestamp: now(),
        });
    }

    let status = if failed > 0 { ArtefactStatus::Failed } else { ArtefactStatus::Succeeded };
    ctx.observer.on_event(ProgressEvent::ExecutionComplete { status, timestamp: now() });

    Ok(RunResult { status, succeeded, failed, skipped, revision: plan.revision })
}

/// Runs one planned job to completion, recording every resulting artefact
/// event along the way.
async fn dispatch_one(
    ctx: &ExecutionContext,
    opts: &ExecuteOpts,
    revision: Revision,
    layer_index: u32,
    planned: &PlannedJob,
    semaphore: &Semaphore,
) -> Result<JobOutcome, RuntimeError> {
    let job = match planned {
        PlannedJob::Scheduled(job) => job,
        PlannedJob::Skipped { job, reason } => {
            record_terminal(ctx, opts, revision, job, ArtefactStatus::Skipped, reason).await?;
            return Ok(JobOutcome::Skipped);
        }
    };

    if ctx.cancellation.is_cancelled() {
        record_terminal(ctx, opts, revision, job, ArtefactStatus::Skipped, "cancelled").await?;
        return Ok(JobOutcome::Skipped);
    }

    let Ok(_permit) = semaphore.acquire().await else {
        record_terminal(ctx, opts, revision, job, ArtefactStatus::Skipped, "concurrency limiter closed")
            .await?;
        return Ok(JobOutcome::Skipped);
    };

    ctx.observer.on_event(ProgressEvent::JobStart { job_id: job.job_id.clone(), timestamp: now() });

    let artifact_inputs: Vec<String> =
        job.declared_inputs.iter().filter(|id| id.starts_with("Artifact:")).cloned().collect();

    let failed_upstream =
        reelgraph_store::resolve::find_failed_artefacts(&ctx.event_log, &opts.movie_id, &artifact_inputs)
            .await?;
    if !failed_upstream.is_empty() {
        record_terminal(ctx, opts, revision, job, ArtefactStatus::Skipped, "upstream failure").await?;
        return Ok(JobOutcome::Skipped);
    }

    let resolved = reelgraph_store::resolve::resolve_artifacts_from_event_log(
        &ctx.event_log,
        &ctx.blob_store,
        &opts.movie_id,
        &artifact_inputs,
    )
    .await?;
    let resolved_json: BTreeMap<String, Value> =
        resolved.iter().map(|(kind, artifact)| (kind.clone(), decoded_to_json(&artifact.payload))).collect();

    if let Some(reason) = dropped_input_reason(job, &resolved_json) {
        record_terminal(ctx, opts, revision, job, ArtefactStatus::Skipped, &reason).await?;
        return Ok(JobOutcome::Skipped);
    }

    let request = ProduceRequest {
        movie_id: opts.movie_id.clone(),
        job: job.clone(),
        layer_index,
        attempt: 1,
        revision: revision.to_string(),
    };

    let inputs_hash = hash_canonical_json(&serde_json::json!(job.declared_inputs));

    let outcome = match ctx.producer.produce(request).await {
        Ok(result) => {
            let mut any_failed = false;
            for artefact in result.artefacts {
                let output = match (&artefact.status, artefact.blob) {
                    (ArtefactStatus::Succeeded, Some(blob)) => {
                        let bytes = encode_produced_blob(&blob.data);
                        let written = ctx.blob_store.write(&bytes, &blob.mime_type).await?;
                        Some(BlobRef { hash: written.hash, size: written.size, mime_type: blob.mime_type })
                    }
                    (ArtefactStatus::Succeeded, None) => {
                        any_failed = true;
                        None
                    }
                    _ => None,
                };
                let status = if output.is_some() { ArtefactStatus::Succeeded } else { artefact.status };
                if status == ArtefactStatus::Failed {
                    any_failed = true;
                }
                ctx.event_log
                    .append_artefact(
                        &opts.movie_id,
                        ArtefactEvent {
                            artefact_id: artefact.artefact_id,
                            revision: revision.to_string(),
                            inputs_hash: inputs_hash.clone(),
                            output,
                            status,
                            produced_by: job.job_id.clone(),
                            created_at: now(),
                            edited_by: None,
                            original_hash: None,
                        },
                    )
                    .await?;
            }
            if any_failed { JobOutcome::Failed } else { JobOutcome::Succeeded }
        }
        Err(provider_error) => {
            for artefact_id in &job.produces {
                ctx.event_log
                    .append_artefact(
                        &opts.movie_id,
                        ArtefactEvent {
                            artefact_id: artefact_id.clone(),
                            revision: revision.to_string(),
                            inputs_hash: inputs_hash.clone(),
                            output: None,
                            status: ArtefactStatus::Failed,
                            produced_by: job.job_id.clone(),
                            created_at: now(),
                            edited_by: None,
                            original_hash: None,
                        },
                    )
                    .await?;
            }
            tracing::warn!(job_id = %job.job_id, reason = %provider_error.reason, "provider failed");
            JobOutcome::Failed
        }
    };

    let final_status = match outcome {
        JobOutcome::Succeeded => ArtefactStatus::Succeeded,
        JobOutcome::Failed => ArtefactStatus::Failed,
        JobOutcome::Skipped => ArtefactStatus::Skipped,
    };
    ctx.observer.on_event(ProgressEvent::JobComplete {
        job_id: job.job_id.clone(),
        status: final_status,
        timestamp: now(),
    });

    Ok(outcome)
}

/// Evaluates every one of `job`'s input conditions against `resolved`.
/// Returns the first unsatisfied reason, since any dropped required input
/// skips the whole job.
fn dropped_input_reason(job: &Job, resolved: &BTreeMap<String, Value>) -> Option<String> {
    for (input_name, condition) in &job.input_conditions {
        match evaluate_condition(&condition.condition, &condition.dim_indices, resolved) {
            Ok(outcome) if outcome.is_satisfied => {}
            Ok(outcome) => {
                return Some(format!(
                    "input {input_name} dropped: {}",
                    outcome.reason.unwrap_or_else(|| "condition unsatisfied".to_string())
                ));
            }
            Err(err) => return Some(format!("input {input_name} condition error: {err}")),
        }
    }
    None
}

/// Thin wrapper over [`reelgraph_core::runtime::condition::evaluate`] that
/// collapses its tri-state result into satisfied/unsatisfied plus reason,
/// since the dispatcher only ever needs the fail-closed boolean.
struct ConditionOutcome {
    /// Whether the condition held.
    is_satisfied: bool,
    /// Why it did not, if it did not.
    reason: Option<String>,
}

fn evaluate_condition(
    condition: &ConditionExpr,
    dim_indices: &BTreeMap<String, u32>,
    resolved: &BTreeMap<String, Value>,
) -> Result<ConditionOutcome, reelgraph_core::core::error::ConditionError> {
    let outcome = reelgraph_core::runtime::condition::evaluate(condition, dim_indices, resolved)?;
    Ok(ConditionOutcome { is_satisfied: outcome.state.is_true(), reason: outcome.reason })
}

/// Appends one `status` event per artefact `job` produces, with `reason` as
/// the shared diagnostic, and emits the matching `JobComplete` progress
/// event.
async fn record_terminal(
    ctx: &ExecutionContext,
    opts: &ExecuteOpts,
    revision: Revision,
    job: &Job,
    status: ArtefactStatus,
    reason: &str,
) -> Result<(), RuntimeError> {
    let inputs_hash = hash_canonical_json(&serde_json::json!(job.declared_inputs));
    for artefact_id in &job.produces {
        ctx.event_log
            .append_artefact(
                &opts.movie_id,
                ArtefactEvent {
                    artefact_id: artefact_id.clone(),
                    revision: revision.to_string(),
                    inputs_hash: inputs_hash.clone(),
                    output: None,
                    status,
                    produced_by: job.job_id.clone(),
                    created_at: now(),
                    edited_by: None,
                    original_hash: None,
                },
            )
            .await?;
    }
    tracing::debug!(job_id = %job.job_id, reason, "job terminal");
    ctx.observer.on_event(ProgressEvent::JobComplete { job_id: job.job_id.clone(), status, timestamp: now() });
    Ok(())
}

/// Decodes a resolved artefact payload to the JSON value the condition
/// evaluator compares against; binary payloads carry no comparable shape.
fn decoded_to_json(payload: &DecodedPayload) -> Value {
    match payload {
        DecodedPayload::Json(value) => value.clone(),
        DecodedPayload::Text(text) => Value::String(text.clone()),
        DecodedPayload::Bytes(_) => Value::Null,
    }
}

/// Encodes a producer's returned payload to the raw bytes the blob store
/// persists.
fn encode_produced_blob(data: &ProducedData) -> Vec<u8> {
    match data {
        ProducedData::Bytes(bytes) => bytes.clone(),
        ProducedData::Text(text) => text.clone().into_bytes(),
        ProducedData::Json(value) => serde_json::to_vec(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::blueprint::ModelHint;
    use reelgraph_core::core::manifest::Revision as Rev;
    use reelgraph_core::core::time::Timestamp;
    use reelgraph_core::interfaces::NullObserver;
    use reelgraph_providers::SimulatedProducer;
    use reelgraph_store::FsBlobStore;
    use reelgraph_store::FsEventLog;
    use std::collections::BTreeMap as Map;

    fn job(id: &str, produces: &[&str], declared_inputs: &[&str]) -> Job {
        Job {
            job_id: id.to_string(),
            producer_name: id.trim_start_matches("Producer:").to_string(),
            layer_hint: 0,
            model: ModelHint::default(),
            declared_inputs: declared_inputs.iter().map(|s| (*s).to_string()).collect(),
            produces: produces.iter().map(|s| (*s).to_string()).collect(),
            input_bindings: Map::new(),
            input_conditions: Map::new(),
            fan_in: Map::new(),
            dimension_indices: Map::new(),
        }
    }

    fn test_context(tmp: &std::path::Path) -> ExecutionContext {
        ExecutionContext {
            event_log: Arc::new(FsEventLog::new(tmp.join("events"))),
            blob_store: Arc::new(FsBlobStore::new(tmp.join("blobs"))),
            producer: Arc::new(SimulatedProducer::new()),
            observer: Arc::new(NullObserver),
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn executes_a_single_layer_plan_to_completion() {
        let tmp = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let ctx = test_context(tmp.path());
        let plan = Plan {
            revision: Rev::from_number(1),
            manifest_base_hash: None,
            layers: vec![vec![PlannedJob::Scheduled(job("Producer:A", &["Artifact:A.X"], &[]))]],
            created_at: Timestamp::from_unix_millis(0),
            blueprint_layer_count: 1,
        };
        let opts = ExecuteOpts { movie_id: "movie-1".to_string(), concurrency: 2 };
        let result = execute_plan(&plan, &ctx, &opts).await.unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(result.status, ArtefactStatus::Succeeded);
        assert_eq!(result.succeeded, 1);
    }

    #[tokio::test]
    async fn skipped_layer_records_skipped_events_without_calling_the_producer() {
        let tmp = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let ctx = test_context(tmp.path());
        let plan = Plan {
            revision: Rev::from_number(1),
            manifest_base_hash: None,
            layers: vec![vec![PlannedJob::Skipped {
                job: job("Producer:A", &["Artifact:A.X"], &[]),
                reason: "before reRunFrom cut".to_string(),
            }]],
            created_at: Timestamp::from_unix_millis(0),
            blueprint_layer_count: 1,
        };
        let opts = ExecuteOpts { movie_id: "movie-1".to_string(), concurrency: 2 };
        let result = execute_plan(&plan, &ctx, &opts).await.unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(result.skipped, 1);
        assert_eq!(result.succeeded, 0);
    }

    #[tokio::test]
    async fn downstream_job_skips_when_upstream_artefact_failed() {
        let tmp = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let ctx = test_context(tmp.path());
        ctx.event_log
            .append_artefact(
                "movie-1",
                ArtefactEvent {
                    artefact_id: "Artifact:A.X".to_string(),
                    revision: "rev-0001".to_string(),
                    inputs_hash: hash_canonical_json(&serde_json::json!([])),
                    output: None,
                    status: ArtefactStatus::Failed,
                    produced_by: "Producer:A".to_string(),
                    created_at: Timestamp::from_unix_millis(0),
                    edited_by: None,
                    original_hash: None,
                },
            )
            .await
            .unwrap_or_else(|_| panic!("append"));

        let plan = Plan {
            revision: Rev::from_number(2),
            manifest_base_hash: None,
            layers: vec![vec![PlannedJob::Scheduled(job(
                "Producer:B",
                &["Artifact:B.X"],
                &["Artifact:A.X"],
            ))]],
            created_at: Timestamp::from_unix_millis(0),
            blueprint_layer_count: 1,
        };
        let opts = ExecuteOpts { movie_id: "movie-1".to_string(), concurrency: 2 };
        let result = execute_plan(&plan, &ctx, &opts).await.unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(result.skipped, 1);
    }
}

// crates/reelgraph-plan/src/lib.rs
// ============================================================================
// Crate: reelgraph-plan
// Description: Turns a flat job list plus the prior manifest into a layered,
//              incrementally-scoped execution plan.
// ============================================================================

//! ## Overview
//! Planning is a pure function of three inputs: the expander's flat job
//! list, the movie's current manifest, and the set of input ids whose
//! payload changed since that manifest was written. It has no knowledge of
//! the filesystem or the event log; `reelgraph-store` resolves those into
//! the `Manifest` and changed-id set this crate consumes.
//!
//! 1. [`layering::topological_layers`] groups jobs into dependency layers.
//! 2. [`dirty::dirty_job_ids`] marks which jobs must re-run this revision.
//! 3. [`build_plan`] combines both into scheduled/skipped layers, then
//!    applies `reRunFrom`/`upToLayer` slicing.

pub mod dirty;
pub mod layering;

use std::collections::BTreeSet;

use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::error::ValidationError;
use reelgraph_core::core::job::Job;
use reelgraph_core::core::job::PlannedJob;
use reelgraph_core::core::manifest::Manifest;
use reelgraph_core::core::manifest::Plan;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::core::manifest::RunConfig;
use reelgraph_core::core::time::Timestamp;

/// Builds a layered execution plan for `jobs` against `base_manifest`.
///
/// `changed_input_ids` is the set of `Input:` ids whose payload digest
/// differs from `base_manifest`'s recorded value (or is entirely new).
///
/// # Errors
///
/// Returns [`ValidationError::CyclicDependency`] if the job graph is not a
/// DAG, and [`RuntimeError`] if `run_config`'s `reRunFrom`/`upToLayer`
/// values are inconsistent with the blueprint's layer count.
pub fn build_plan(
    jobs: &[Job],
    base_manifest: &Manifest,
    changed_input_ids: &BTreeSet<String>,
    run_config: &RunConfig,
    created_at: Timestamp,
) -> Result<Plan, PlanError> {
    let layers = layering::topological_layers(jobs)?;
    let dirty = dirty::dirty_job_ids(jobs, changed_input_ids, base_manifest);

    let blueprint_layer_count = u32::try_from(layers.len()).unwrap_or(u32::MAX);
    validate_rerun_bounds(run_config, blueprint_layer_count)?;

    let mut planned_layers: Vec<Vec<PlannedJob>> = Vec::with_capacity(layers.len());
    for (layer_index, layer) in layers.iter().enumerate() {
        let layer_index = u32::try_from(layer_index).unwrap_or(u32::MAX);
        let mut planned_layer = Vec::with_capacity(layer.len());
        for job in layer {
            let is_dirty = dirty.contains(job.job_id.as_str());
            if let Some(planned) = classify(job, is_dirty, layer_index, run_config) {
                planned_layer.push(planned);
            }
        }
        planned_layers.push(planned_layer);
    }

    let revision = base_manifest.revision.next();
    Ok(Plan {
        revision,
        manifest_base_hash: Some(base_manifest.content_hash().as_str().to_string()),
        layers: planned_layers,
        created_at,
        blueprint_layer_count,
    })
}

/// Classifies one job for one layer. Returns `None` for a cache hit — the
/// job's artifacts are all already present and not dirty, so it is dropped
/// from the plan entirely rather than retained as a `Skipped` entry; a
/// `Skipped` entry is reserved for jobs excluded by `reRunFrom`/`upToLayer`
/// slicing, where traceability of the cut matters.
fn classify(job: &Job, is_dirty: bool, layer_index: u32, run_config: &RunConfig) -> Option<PlannedJob> {
    if let Some(re_run_from) = run_config.re_run_from
        && layer_index < re_run_from
    {
        return Some(PlannedJob::Skipped { job: job.clone(), reason: "before reRunFrom cut".to_string() });
    }
    if let Some(up_to_layer) = run_config.up_to_layer
        && layer_index > up_to_layer
    {
        return Some(PlannedJob::Skipped { job: job.clone(), reason: "beyond upToLayer".to_string() });
    }
    if run_config.re_run_from.is_some() || is_dirty {
        return Some(PlannedJob::Scheduled(job.clone()));
    }
    None
}

fn validate_rerun_bounds(run_config: &RunConfig, blueprint_layer_count: u32) -> Result<(), RuntimeError> {
    if let Some(re_run_from) = run_config.re_run_from
        && re_run_from >= blueprint_layer_count
        && blueprint_layer_count > 0
    {
        return Err(RuntimeError::RerunFromExceedsLayers {
            re_run_from,
            layer_count: blueprint_layer_count,
        });
    }
    if let (Some(re_run_from), Some(up_to_layer)) = (run_config.re_run_from, run_config.up_to_layer)
        && re_run_from > up_to_layer
    {
        return Err(RuntimeError::RerunFromGreaterThanUpTo { re_run_from, up_to_layer });
    }
    Ok(())
}

/// The union of failure modes raised while building a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The job graph is not a DAG.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// `reRunFrom`/`upToLayer` are inconsistent with the plan's shape.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl PlanError {
    /// Stable error code for this failure.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(error) => error.code(),
            Self::Runtime(error) => error.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::blueprint::ModelHint;
    use std::collections::BTreeMap;

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

    fn empty_manifest() -> Manifest {
        Manifest {
            revision: Revision::INITIAL,
            base_revision: None,
            created_at: Timestamp::from_unix_millis(0),
            inputs: BTreeMap::new(),
            artefacts: BTreeMap::new(),
            run_config: None,
        }
    }

    #[test]
    fn fresh_run_schedules_every_job() {
        let jobs = vec![job("Producer:A", &["Artifact:A.X"], &[])];
        let plan = build_plan(
            &jobs,
            &empty_manifest(),
            &BTreeSet::new(),
            &RunConfig::default(),
            Timestamp::from_unix_millis(0),
        )
        .unwrap_or_else(|err| panic!("plan failed: {err:?}"));
        assert_eq!(plan.scheduled_job_count(), 1);
        assert_eq!(plan.revision.number(), 1);
    }

    #[test]
    fn rerun_from_beyond_layer_count_is_rejected() {
        let jobs = vec![job("Producer:A", &["Artifact:A.X"], &[])];
        let run_config = RunConfig { re_run_from: Some(5), ..RunConfig::default() };
        let err = build_plan(
            &jobs,
            &empty_manifest(),
            &BTreeSet::new(),
            &run_config,
            Timestamp::from_unix_millis(0),
        )
        .unwrap_err();
        assert_eq!(err.code(), "RERUN_FROM_EXCEEDS_LAYERS");
    }

    #[test]
    fn rerun_from_greater_than_up_to_layer_is_rejected() {
        let jobs = vec![job("Producer:A", &["Artifact:A.X"], &[])];
        let run_config = RunConfig { re_run_from: Some(2), up_to_layer: Some(1), ..RunConfig::default() };
        let err = build_plan(
            &jobs,
            &empty_manifest(),
            &BTreeSet::new(),
            &run_config,
            Timestamp::from_unix_millis(0),
        )
        .unwrap_err();
        assert_eq!(err.code(), "RERUN_FROM_GREATER_THAN_UPTO");
    }
}

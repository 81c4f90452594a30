// crates/reelgraph-plan/src/layering.rs
// ============================================================================
// Module: Reelgraph Topological Layering
// Description: Groups a job list into disjoint, dependency-respecting
//              layers via Kahn's algorithm with a lexicographic tie-break.
// Purpose: Give every downstream pass (dirty diffing, reRunFrom slicing,
//          the dispatcher's per-layer barrier) a deterministic layer index.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! A job belongs to layer `k` when the longest dependency chain beneath it
//! has length `k`: layer 0 holds every job with no unresolved dependency
//! (inputs only), layer 1 holds jobs that depend only on layer 0's outputs,
//! and so on. Ties within a layer are broken by `job_id`, so the same
//! blueprint always reproduces the same layering regardless of declaration
//! order.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use reelgraph_core::core::error::ValidationError;
use reelgraph_core::core::job::Job;

/// Computes each job's dependency layer, and the producing job id for every
/// artifact, keyed by artifact id.
///
/// # Errors
///
/// Returns [`ValidationError::CyclicDependency`] if the dependency graph
/// formed by `declared_inputs` is not a DAG.
pub fn topological_layers(jobs: &[Job]) -> Result<Vec<Vec<&Job>>, ValidationError> {
    let mut producer_of: BTreeMap<&str, &str> = BTreeMap::new();
    for job in jobs {
        for artifact_id in &job.produces {
            producer_of.insert(artifact_id.as_str(), job.job_id.as_str());
        }
    }

    let mut upstream: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut downstream: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_id: BTreeMap<&str, &Job> = BTreeMap::new();

    for job in jobs {
        by_id.insert(job.job_id.as_str(), job);
        let mut deps: Vec<&str> = job
            .declared_inputs
            .iter()
            .filter_map(|id| producer_of.get(id.as_str()).copied())
            .filter(|&producer_id| producer_id != job.job_id.as_str())
            .collect();
        deps.sort_unstable();
        deps.dedup();
        for &dep in &deps {
            downstream.entry(dep).or_default().push(job.job_id.as_str());
        }
        in_degree.insert(job.job_id.as_str(), deps.len());
        upstream.insert(job.job_id.as_str(), deps);
    }

    let mut remaining = in_degree.clone();
    let mut layers: Vec<Vec<&Job>> = Vec::new();
    let mut ready: Vec<&str> =
        remaining.iter().filter(|(_, &degree)| degree == 0).map(|(&id, _)| id).collect();
    ready.sort_unstable();

    let mut scheduled_count = 0usize;
    let mut frontier: VecDeque<&str> = ready.into();

    while !frontier.is_empty() {
        let mut this_layer: Vec<&str> = frontier.drain(..).collect();
        this_layer.sort_unstable();
        let mut next_ready: Vec<&str> = Vec::new();

        for &id in &this_layer {
            scheduled_count += 1;
            if let Some(consumers) = downstream.get(id) {
                for &consumer in consumers {
                    if let Some(degree) = remaining.get_mut(consumer) {
                        *degree -= 1;
                        if *degree == 0 {
                            next_ready.push(consumer);
                        }
                    }
                }
            }
        }

        layers.push(this_layer.iter().map(|&id| by_id[id]).collect());
        next_ready.sort_unstable();
        next_ready.dedup();
        frontier = next_ready.into();
    }

    if scheduled_count != jobs.len() {
        let stuck = remaining
            .iter()
            .find(|(_, &degree)| degree > 0)
            .map(|(&id, _)| id.to_string())
            .unwrap_or_default();
        return Err(ValidationError::CyclicDependency { job_id: stuck });
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::blueprint::ModelHint;
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

    #[test]
    fn orders_a_linear_chain_into_ascending_layers() {
        let a = job("Producer:A", &["Artifact:A.X"], &[]);
        let b = job("Producer:B", &["Artifact:B.X"], &["Artifact:A.X"]);
        let c = job("Producer:C", &["Artifact:C.X"], &["Artifact:B.X"]);
        let layers = topological_layers(&[c, a, b]).unwrap_or_else(|_| panic!("layers"));
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0][0].job_id, "Producer:A");
        assert_eq!(layers[1][0].job_id, "Producer:B");
        assert_eq!(layers[2][0].job_id, "Producer:C");
    }

    #[test]
    fn ties_within_a_layer_break_lexicographically() {
        let a = job("Producer:B", &[], &[]);
        let b = job("Producer:A", &[], &[]);
        let layers = topological_layers(&[a, b]).unwrap_or_else(|_| panic!("layers"));
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0][0].job_id, "Producer:A");
        assert_eq!(layers[0][1].job_id, "Producer:B");
    }

    #[test]
    fn reports_cycle_as_error() {
        let a = job("Producer:A", &["Artifact:A.X"], &["Artifact:B.X"]);
        let b = job("Producer:B", &["Artifact:B.X"], &["Artifact:A.X"]);
        let err = topological_layers(&[a, b]).unwrap_err();
        assert_eq!(err.code(), "CYCLIC_DEPENDENCY");
    }
}

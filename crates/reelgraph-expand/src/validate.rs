// crates/reelgraph-expand/src/validate.rs
// ============================================================================
// Module: Reelgraph Graph Validation
// Description: Structural checks over a fully-connected job list: every
//              declared producer input is bound, and the producer-level
//              dependency graph is acyclic.
// Purpose: Catch contract violations before a plan is ever built, per the
//          Parse/Validation error category that aborts before planning.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! Reference resolution during connection wiring already rejects dangling
//! endpoint references. What's left to check once every job has its
//! bindings: that every producer input the blueprint declared actually
//! received a binding (catching a producer input nobody ever connects to),
//! and that the resulting producer dependency graph has no cycle.

use std::collections::BTreeMap;
use std::collections::HashSet;

use reelgraph_core::core::error::ValidationError;
use reelgraph_core::core::job::Job;

/// Validates a fully-connected job list.
///
/// # Errors
///
/// Returns [`ValidationError::MissingInputSource`] if a producer input has
/// no binding, and [`ValidationError::CyclicDependency`] if the producer
/// dependency graph contains a cycle.
pub fn validate(jobs: &[Job], declared_producer_inputs: &BTreeMap<String, Vec<String>>) -> Result<(), ValidationError> {
    check_all_inputs_bound(jobs, declared_producer_inputs)?;
    check_acyclic(jobs)?;
    Ok(())
}

fn check_all_inputs_bound(
    jobs: &[Job],
    declared_producer_inputs: &BTreeMap<String, Vec<String>>,
) -> Result<(), ValidationError> {
    for job in jobs {
        let Some(required) = declared_producer_inputs.get(&job.producer_name) else {
            continue;
        };
        for input_name in required {
            let bound = job.input_bindings.contains_key(input_name)
                || job.fan_in.contains_key(input_name);
            if !bound {
                return Err(ValidationError::MissingInputSource {
                    input_id: format!("{}.{input_name}", job.producer_name),
                });
            }
        }
    }
    Ok(())
}

fn check_acyclic(jobs: &[Job]) -> Result<(), ValidationError> {
    let mut producer_of_artifact: BTreeMap<&str, &str> = BTreeMap::new();
    for job in jobs {
        for artifact_id in &job.produces {
            producer_of_artifact.insert(artifact_id.as_str(), job.job_id.as_str());
        }
    }

    let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for job in jobs {
        let mut upstream: Vec<&str> = job
            .declared_inputs
            .iter()
            .filter_map(|id| producer_of_artifact.get(id.as_str()).copied())
            .collect();
        upstream.sort_unstable();
        upstream.dedup();
        edges.insert(job.job_id.as_str(), upstream);
    }

    let mut visiting = HashSet::new();
    let mut visited = HashSet::new();
    for job in jobs {
        if !visited.contains(job.job_id.as_str()) {
            dfs(job.job_id.as_str(), &edges, &mut visiting, &mut visited)?;
        }
    }
    Ok(())
}

fn dfs<'a>(
    node: &'a str,
    edges: &BTreeMap<&'a str, Vec<&'a str>>,
    visiting: &mut HashSet<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> Result<(), ValidationError> {
    visiting.insert(node);
    if let Some(upstream) = edges.get(node) {
        for &next in upstream {
            if visiting.contains(next) {
                return Err(ValidationError::CyclicDependency { job_id: next.to_string() });
            }
            if !visited.contains(next) {
                dfs(next, edges, visiting, visited)?;
            }
        }
    }
    visiting.remove(node);
    visited.insert(node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::blueprint::ModelHint;

    fn sample_job(id: &str, produces: Vec<&str>, declared_inputs: Vec<&str>) -> Job {
        Job {
            job_id: id.to_string(),
            producer_name: id.trim_start_matches("Producer:").to_string(),
            layer_hint: 0,
            model: ModelHint::default(),
            declared_inputs: declared_inputs.into_iter().map(String::from).collect(),
            produces: produces.into_iter().map(String::from).collect(),
            input_bindings: BTreeMap::new(),
            input_conditions: BTreeMap::new(),
            fan_in: BTreeMap::new(),
            dimension_indices: BTreeMap::new(),
        }
    }

    #[test]
    fn detects_two_job_cycle() {
        let a = sample_job("Producer:A", vec!["Artifact:A.X"], vec!["Artifact:B.X"]);
        let b = sample_job("Producer:B", vec!["Artifact:B.X"], vec!["Artifact:A.X"]);
        let err = check_acyclic(&[a, b]).unwrap_err();
        assert_eq!(err.code(), "CYCLIC_DEPENDENCY");
    }

    #[test]
    fn accepts_acyclic_chain() {
        let a = sample_job("Producer:A", vec!["Artifact:A.X"], vec![]);
        let b = sample_job("Producer:B", vec!["Artifact:B.X"], vec!["Artifact:A.X"]);
        check_acyclic(&[a, b]).unwrap_or_else(|_| panic!("should be acyclic"));
    }

    #[test]
    fn flags_unbound_producer_input() {
        let job = sample_job("Producer:A", vec!["Artifact:A.X"], vec![]);
        let mut required = BTreeMap::new();
        required.insert("A".to_string(), vec!["Topic".to_string()]);
        let err = validate(&[job], &required).unwrap_err();
        assert_eq!(err.code(), "MISSING_INPUT_SOURCE");
    }
}

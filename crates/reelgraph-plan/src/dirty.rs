// crates/reelgraph-plan/src/dirty.rs
// ============================================================================
// Module: Reelgraph Dirty Diffing
// Description: Determines which jobs must re-run given a set of changed
//              inputs and the prior manifest's artefact state.
// Purpose: Drive incremental re-execution: a job is dirty when one of its
//          own inputs changed, it has never produced a succeeded artefact,
//          or anything upstream of it is dirty.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! Dirtiness starts at the jobs directly touched by a changed input or
//! missing/failed prior output, then propagates forward along the producer
//! dependency graph: any job consuming a dirty job's artifact is dirty too,
//! transitively.

use std::collections::BTreeSet;
use std::collections::VecDeque;

use reelgraph_core::core::job::Job;
use reelgraph_core::core::manifest::Manifest;

/// Returns the set of job ids that must run this revision.
#[must_use]
pub fn dirty_job_ids(
    jobs: &[Job],
    changed_input_ids: &BTreeSet<String>,
    base_manifest: &Manifest,
) -> BTreeSet<String> {
    let mut dirty: BTreeSet<String> = BTreeSet::new();

    for job in jobs {
        if is_initially_dirty(job, changed_input_ids, base_manifest) {
            dirty.insert(job.job_id.clone());
        }
    }

    let mut consumers_of: std::collections::BTreeMap<&str, Vec<&str>> =
        std::collections::BTreeMap::new();
    let mut producer_of: std::collections::BTreeMap<&str, &str> =
        std::collections::BTreeMap::new();
    for job in jobs {
        for artifact_id in &job.produces {
            producer_of.insert(artifact_id.as_str(), job.job_id.as_str());
        }
    }
    for job in jobs {
        for input_id in &job.declared_inputs {
            if let Some(&producer_id) = producer_of.get(input_id.as_str()) {
                consumers_of.entry(producer_id).or_default().push(job.job_id.as_str());
            }
        }
    }

    let mut queue: VecDeque<String> = dirty.iter().cloned().collect();
    while let Some(job_id) = queue.pop_front() {
        if let Some(consumers) = consumers_of.get(job_id.as_str()) {
            for &consumer in consumers {
                if dirty.insert(consumer.to_string()) {
                    queue.push_back(consumer.to_string());
                }
            }
        }
    }

    dirty
}

fn is_initially_dirty(job: &Job, changed_input_ids: &BTreeSet<String>, base_manifest: &Manifest) -> bool {
    let touches_changed_input = job
        .declared_inputs
        .iter()
        .any(|id| id.starts_with("Input:") && changed_input_ids.contains(id));
    if touches_changed_input {
        return true;
    }

    job.produces.iter().any(|artifact_id| {
        base_manifest
            .artefacts
            .get(artifact_id)
            .is_none_or(|entry| entry.status != reelgraph_core::core::event::ArtefactStatus::Succeeded)
    })
}

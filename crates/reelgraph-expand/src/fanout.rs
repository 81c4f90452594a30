// crates/reelgraph-expand/src/fanout.rs
// ============================================================================
// Module: Reelgraph Producer Fanout
// Description: Expands each producer declaration into one job per point in
//              the Cartesian product of its loop memberships.
// Purpose: Turn a single `ProducerDecl` plus resolved dimension sizes into
//          the concrete, dimension-indexed `Job` skeletons the connection
//          pass then wires up.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! A producer with no loop membership fans out to exactly one job. A
//! producer declared inside `k` nested loops fans out to the product of
//! their sizes, in outer-to-inner declaration order, each job carrying the
//! concrete ordinal it occupies in every one of those loops.

use std::collections::BTreeMap;

use reelgraph_core::core::blueprint::ModelHint;
use reelgraph_core::core::error::ValidationError;
use reelgraph_core::core::ids::DimIndices;
use reelgraph_core::core::job::Job;

use crate::flatten::FlatBlueprint;
use crate::flatten::FlatProducer;
use crate::flatten::join_dotted;

/// Expands every producer in `flat` into one job skeleton per fanout point.
///
/// Skeletons carry `job_id`, `producer_name`, `model`, `dimension_indices`,
/// and `produces`, but no input bindings yet; [`crate::connect::connect`]
/// fills those in.
///
/// # Errors
///
/// Returns [`ValidationError::MissingDimensionSize`] if a producer's loop
/// membership names a loop absent from `dim_sizes`.
pub fn fanout_producers(
    flat: &FlatBlueprint,
    dim_sizes: &BTreeMap<String, u32>,
) -> Result<Vec<Job>, ValidationError> {
    let mut jobs = Vec::new();
    for producer in flat.producers.values() {
        jobs.extend(fanout_one(flat, producer, dim_sizes)?);
    }
    Ok(jobs)
}

fn fanout_one(
    flat: &FlatBlueprint,
    producer: &FlatProducer,
    dim_sizes: &BTreeMap<String, u32>,
) -> Result<Vec<Job>, ValidationError> {
    let dotted_loops: Vec<String> = producer
        .decl
        .loop_membership
        .iter()
        .map(|local_name| join_dotted(&producer.namespace, local_name))
        .collect();

    let mut sizes = Vec::with_capacity(dotted_loops.len());
    for dotted_loop in &dotted_loops {
        let size = *dim_sizes.get(dotted_loop).ok_or_else(|| {
            let (namespace, loop_name) = dotted_loop
                .rsplit_once('.')
                .map(|(ns, leaf)| (ns.to_string(), leaf.to_string()))
                .unwrap_or_else(|| (String::new(), dotted_loop.clone()));
            ValidationError::MissingDimensionSize { namespace, loop_name }
        })?;
        sizes.push(size);
    }

    let tuples = cartesian_ordinals(&sizes);
    let producer_dotted_name = producer.dotted_name();

    let mut jobs = Vec::with_capacity(tuples.len().max(1));
    for tuple in tuples {
        let dims = DimIndices::Ordinal(tuple.clone());
        let job_id = format!("Producer:{producer_dotted_name}{dims}");

        let mut dimension_indices = BTreeMap::new();
        for (dotted_loop, ordinal) in dotted_loops.iter().zip(tuple.iter()) {
            dimension_indices.insert(dotted_loop.clone(), *ordinal);
        }

        let produces = producer
            .decl
            .produces
            .iter()
            .map(|artifact_name| {
                let dotted = join_dotted(&producer.namespace, artifact_name);
                format!("Artifact:{dotted}{dims}")
            })
            .collect();

        jobs.push(Job {
            job_id,
            producer_name: producer_dotted_name.clone(),
            layer_hint: u32::try_from(producer.namespace.len()).unwrap_or(u32::MAX),
            model: model_hint(&producer.decl.model),
            declared_inputs: Vec::new(),
            produces,
            input_bindings: BTreeMap::new(),
            input_conditions: BTreeMap::new(),
            fan_in: BTreeMap::new(),
            dimension_indices,
        });
    }

    if jobs.is_empty() && dotted_loops.is_empty() {
        // A producer with no loop membership still runs exactly once.
        jobs.push(Job {
            job_id: format!("Producer:{producer_dotted_name}"),
            producer_name: producer_dotted_name.clone(),
            layer_hint: u32::try_from(producer.namespace.len()).unwrap_or(u32::MAX),
            model: model_hint(&producer.decl.model),
            declared_inputs: Vec::new(),
            produces: producer
                .decl
                .produces
                .iter()
                .map(|artifact_name| {
                    format!("Artifact:{}", join_dotted(&producer.namespace, artifact_name))
                })
                .collect(),
            input_bindings: BTreeMap::new(),
            input_conditions: BTreeMap::new(),
            fan_in: BTreeMap::new(),
            dimension_indices: BTreeMap::new(),
        });
    }
    Ok(jobs)
}

fn model_hint(hint: &ModelHint) -> ModelHint {
    hint.clone()
}

/// Every ordinal tuple in the Cartesian product of `0..sizes[i]`, in
/// outer-to-inner order matching `sizes`'s own order. An empty `sizes`
/// yields an empty Vec (handled by the caller as "exactly one job, no
/// dims").
fn cartesian_ordinals(sizes: &[u32]) -> Vec<Vec<u32>> {
    if sizes.is_empty() {
        return Vec::new();
    }
    let mut tuples: Vec<Vec<u32>> = vec![Vec::new()];
    for &size in sizes {
        let mut next = Vec::with_capacity(tuples.len() * size as usize);
        for tuple in &tuples {
            for ordinal in 0..size {
                let mut extended = tuple.clone();
                extended.push(ordinal);
                next.push(extended);
            }
        }
        tuples = next;
    }
    tuples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_ordinals_over_two_dims() {
        let tuples = cartesian_ordinals(&[2, 3]);
        assert_eq!(tuples.len(), 6);
        assert_eq!(tuples[0], vec![0, 0]);
        assert_eq!(tuples[5], vec![1, 2]);
    }

    #[test]
    fn cartesian_ordinals_empty_for_no_dims() {
        assert!(cartesian_ordinals(&[]).is_empty());
    }
}

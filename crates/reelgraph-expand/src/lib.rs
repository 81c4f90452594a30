// crates/reelgraph-expand/src/lib.rs
// ============================================================================
// Crate: reelgraph-expand
// Description: Expands a blueprint tree into a flat, dimension-indexed job
//              list ready for planning.
// ============================================================================

//! ## Overview
//! The expander runs in five passes over a blueprint tree:
//! 1. [`flatten`] walks the tree into a flat registry keyed by dotted name.
//! 2. [`dims::resolve_dimension_sizes`] resolves every loop's `countInput`
//!    to a concrete size.
//! 3. [`fanout::fanout_producers`] expands each producer into one job per
//!    point in the Cartesian product of its loop memberships.
//! 4. [`connect::connect`] wires every connection's source into the job(s)
//!    its target names, producing input bindings, fan-in collectors, and
//!    attached conditions.
//! 5. [`validate::validate`] checks every producer input got bound and that
//!    the resulting producer dependency graph is acyclic.
//!
//! The only entry point most callers need is [`expand`].

pub mod connect;
pub mod dims;
pub mod fanout;
pub mod flatten;
pub mod reference;
pub mod validate;

use std::collections::BTreeMap;

use reelgraph_core::core::blueprint::BlueprintNode;
use reelgraph_core::core::error::ValidationError;
use reelgraph_core::core::job::Job;
use serde_json::Value;

pub use flatten::FlatBlueprint;
pub use flatten::flatten;

/// Expands `root` into a flat job list, given the consolidated set of
/// resolved input values (keyed by dotted input name or `Input:` id,
/// either form accepted).
///
/// # Errors
///
/// Returns [`ValidationError`] if any loop's size cannot be resolved, any
/// connection reference is dangling, any producer input is left unbound,
/// or the resulting producer dependency graph contains a cycle.
pub fn expand(
    root: &BlueprintNode,
    input_values: &BTreeMap<String, Value>,
) -> Result<Vec<Job>, ValidationError> {
    let flat = flatten(root);
    let dim_sizes = dims::resolve_dimension_sizes(&flat, input_values)?;
    let mut jobs = fanout::fanout_producers(&flat, &dim_sizes)?;
    connect::connect(&flat, &dim_sizes, &mut jobs)?;

    let declared_producer_inputs: BTreeMap<String, Vec<String>> = flat
        .producers
        .values()
        .map(|producer| (producer.dotted_name(), producer.decl.inputs.clone()))
        .collect();
    validate::validate(&jobs, &declared_producer_inputs)?;

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::blueprint::ArtifactDecl;
    use reelgraph_core::core::blueprint::ConnectionDecl;
    use reelgraph_core::core::blueprint::CountInputRef;
    use reelgraph_core::core::blueprint::DimSelector;
    use reelgraph_core::core::blueprint::Endpoint;
    use reelgraph_core::core::blueprint::InputDecl;
    use reelgraph_core::core::blueprint::LoopDecl;
    use reelgraph_core::core::blueprint::ModelHint;
    use reelgraph_core::core::blueprint::ProducerDecl;
    use serde_json::json;

    #[test]
    fn expands_a_looped_producer_chain_end_to_end() {
        let mut root = BlueprintNode::default();
        root.inputs.push(InputDecl { name: "SegmentCount".to_string(), default: None });
        root.loops.push(LoopDecl {
            name: "Segments".to_string(),
            count: CountInputRef { count_input: "SegmentCount".to_string() },
        });
        root.producers.push(ProducerDecl {
            name: "Writer".to_string(),
            inputs: Vec::new(),
            produces: vec!["Script".to_string()],
            model: ModelHint::default(),
            loop_membership: vec!["Segments".to_string()],
        });
        root.artifacts.push(ArtifactDecl { name: "Script".to_string(), mime_type: None });
        root.producers.push(ProducerDecl {
            name: "Narrator".to_string(),
            inputs: vec!["Script".to_string()],
            produces: vec!["Narration".to_string()],
            model: ModelHint::default(),
            loop_membership: vec!["Segments".to_string()],
        });
        root.artifacts.push(ArtifactDecl { name: "Narration".to_string(), mime_type: None });
        root.connections.push(ConnectionDecl {
            source: Endpoint {
                reference: "Script".to_string(),
                dims: vec![DimSelector::Free("Segments".to_string())],
            },
            target: Endpoint {
                reference: "Narrator.Script".to_string(),
                dims: vec![DimSelector::Free("Segments".to_string())],
            },
            condition: None,
        });

        let mut inputs = BTreeMap::new();
        inputs.insert("SegmentCount".to_string(), json!(2));

        let jobs = expand(&root, &inputs).unwrap_or_else(|err| panic!("expand failed: {err:?}"));

        assert_eq!(jobs.len(), 4);
        let narrator_jobs: Vec<&Job> =
            jobs.iter().filter(|job| job.producer_name == "Narrator").collect();
        assert_eq!(narrator_jobs.len(), 2);
        for job in narrator_jobs {
            assert!(job.input_bindings.get("Script").is_some());
        }
    }

    #[test]
    fn collects_fan_in_members_across_a_dimension() {
        let mut root = BlueprintNode::default();
        root.inputs.push(InputDecl { name: "SegmentCount".to_string(), default: None });
        root.loops.push(LoopDecl {
            name: "Segments".to_string(),
            count: CountInputRef { count_input: "SegmentCount".to_string() },
        });
        root.producers.push(ProducerDecl {
            name: "Writer".to_string(),
            inputs: Vec::new(),
            produces: vec!["Script".to_string()],
            model: ModelHint::default(),
            loop_membership: vec!["Segments".to_string()],
        });
        root.artifacts.push(ArtifactDecl { name: "Script".to_string(), mime_type: None });
        root.producers.push(ProducerDecl {
            name: "Assembler".to_string(),
            inputs: vec!["Scripts".to_string()],
            produces: vec!["FullScript".to_string()],
            model: ModelHint::default(),
            loop_membership: Vec::new(),
        });
        root.artifacts.push(ArtifactDecl { name: "FullScript".to_string(), mime_type: None });
        root.connections.push(ConnectionDecl {
            source: Endpoint {
                reference: "Script".to_string(),
                dims: vec![DimSelector::Collect("Segments".to_string())],
            },
            target: Endpoint { reference: "Assembler.Scripts".to_string(), dims: Vec::new() },
            condition: None,
        });

        let mut inputs = BTreeMap::new();
        inputs.insert("SegmentCount".to_string(), json!(3));

        let jobs = expand(&root, &inputs).unwrap_or_else(|err| panic!("expand failed: {err:?}"));
        let assembler = jobs
            .iter()
            .find(|job| job.producer_name == "Assembler")
            .unwrap_or_else(|| panic!("assembler job"));
        let fan_in = assembler
            .fan_in
            .get("Scripts")
            .unwrap_or_else(|| panic!("fan-in collector"));
        assert_eq!(fan_in.members.len(), 3);
    }

    #[test]
    fn missing_dimension_size_is_reported() {
        let mut root = BlueprintNode::default();
        root.loops.push(LoopDecl {
            name: "Segments".to_string(),
            count: CountInputRef { count_input: "Nope".to_string() },
        });
        root.producers.push(ProducerDecl {
            name: "Writer".to_string(),
            inputs: Vec::new(),
            produces: Vec::new(),
            model: ModelHint::default(),
            loop_membership: vec!["Segments".to_string()],
        });

        let err = expand(&root, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code(), "MISSING_DIMENSION_SIZE");
    }
}

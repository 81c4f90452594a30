// crates/reelgraph-expand/src/dims.rs
// ============================================================================
// Module: Reelgraph Dimension Resolution
// Description: Resolves each declared loop's size from the consolidated
//              input set.
// Purpose: Turn `countInput` references into a concrete `u32` per loop,
//          keyed by the loop's dotted name, for the fanout pass to consume.
// Dependencies: reelgraph-core, serde_json
// ============================================================================

//! ## Overview
//! A loop's size comes from an input value, looked up by resolving its
//! `countInput` reference relative to the namespace the loop was declared
//! in (falling back to an absolute lookup, same convention as connection
//! endpoints). The resolved value must be a non-negative integer.

use std::collections::BTreeMap;

use reelgraph_core::core::error::ValidationError;

use crate::flatten::FlatBlueprint;
use crate::flatten::join_dotted;

/// Resolves every loop's size, keyed by the loop's dotted name.
///
/// # Errors
///
/// Returns [`ValidationError::MissingDimensionSize`] when a loop's
/// `countInput` cannot be resolved to an integer input value.
pub fn resolve_dimension_sizes(
    flat: &FlatBlueprint,
    input_values: &BTreeMap<String, serde_json::Value>,
) -> Result<BTreeMap<String, u32>, ValidationError> {
    let mut sizes = BTreeMap::new();
    for (dotted_loop_name, loop_decl) in &flat.loops {
        let (namespace, loop_name) = split_last(dotted_loop_name);
        let namespace_segments: Vec<String> =
            if namespace.is_empty() { Vec::new() } else { namespace.split('.').map(String::from).collect() };
        let size = resolve_count_input(&namespace_segments, &loop_decl.count.count_input, input_values)
            .ok_or(ValidationError::MissingDimensionSize { namespace, loop_name })?;
        sizes.insert(dotted_loop_name.clone(), size);
    }
    Ok(sizes)
}

fn resolve_count_input(
    namespace: &[String],
    count_input: &str,
    input_values: &BTreeMap<String, serde_json::Value>,
) -> Option<u32> {
    let relative = join_dotted(namespace, count_input);
    let candidate = input_values
        .get(&relative)
        .or_else(|| input_values.get(count_input))
        .or_else(|| input_values.get(&format!("Input:{relative}")))
        .or_else(|| input_values.get(&format!("Input:{count_input}")))?;
    candidate.as_u64().and_then(|value| u32::try_from(value).ok())
}

fn split_last(dotted_name: &str) -> (String, String) {
    match dotted_name.rsplit_once('.') {
        Some((namespace, leaf)) => (namespace.to_string(), leaf.to_string()),
        None => (String::new(), dotted_name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use reelgraph_core::core::blueprint::BlueprintNode;
    use reelgraph_core::core::blueprint::CountInputRef;
    use reelgraph_core::core::blueprint::LoopDecl;
    use serde_json::json;

    #[test]
    fn resolves_loop_size_from_matching_input() {
        let mut root = BlueprintNode::default();
        root.loops.push(LoopDecl {
            name: "Segments".to_string(),
            count: CountInputRef { count_input: "SegmentCount".to_string() },
        });
        let flat = flatten(&root);

        let mut inputs = BTreeMap::new();
        inputs.insert("SegmentCount".to_string(), json!(3));

        let sizes = resolve_dimension_sizes(&flat, &inputs).unwrap_or_else(|_| panic!("resolve"));
        assert_eq!(sizes.get("Segments"), Some(&3));
    }

    #[test]
    fn missing_count_input_is_an_error() {
        let mut root = BlueprintNode::default();
        root.loops.push(LoopDecl {
            name: "Segments".to_string(),
            count: CountInputRef { count_input: "Nope".to_string() },
        });
        let flat = flatten(&root);
        let err = resolve_dimension_sizes(&flat, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.code(), "MISSING_DIMENSION_SIZE");
    }
}

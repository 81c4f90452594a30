// crates/reelgraph-expand/src/connect.rs
// ============================================================================
// Module: Reelgraph Connection Resolution
// Description: Wires each blueprint connection into the job(s) it targets,
//              filling in input bindings, fan-in collectors, and conditions.
// Purpose: Turn the declarative `source -> target` edges of a blueprint into
//          the concrete per-job bindings the planner and dispatcher read.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! A connection's target resolves to one producer and one of its declared
//! input names; every fanned-out job for that producer whose dimension
//! indices satisfy the target's `Pin` selectors receives the binding. A
//! connection's source resolves to an input or an artifact; `[dim]`
//! selectors take the consuming job's own ordinal for that dimension,
//! `[dim=const]` pins a fixed ordinal, and `[dim=*]` gathers every member
//! across that dimension into a fan-in collector instead of a single bound
//! id.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use reelgraph_core::core::blueprint::DimSelector;
use reelgraph_core::core::blueprint::Endpoint;
use reelgraph_core::core::error::ValidationError;
use reelgraph_core::core::ids::DimIndices;
use reelgraph_core::core::job::FanIn;
use reelgraph_core::core::job::InputCondition;
use reelgraph_core::core::job::Job;

use crate::flatten::FlatBlueprint;
use crate::flatten::join_dotted;
use crate::reference::ReferenceKind;
use crate::reference::resolve_source;
use crate::reference::resolve_target_input;

/// Resolves every connection in `flat` against `jobs`, filling in input
/// bindings, fan-in collectors, and input conditions in place.
///
/// # Errors
///
/// Returns [`ValidationError::MissingInputSource`] when a connection's
/// source or target reference does not resolve, and
/// [`ValidationError::GraphExpansionError`] for other structural
/// inconsistencies (e.g. a `[dim]` selector on an `Input:` source).
pub fn connect(
    flat: &FlatBlueprint,
    dim_sizes: &BTreeMap<String, u32>,
    jobs: &mut [Job],
) -> Result<(), ValidationError> {
    for connection in &flat.connections {
        let (producer_dotted, input_name) =
            resolve_target_input(flat, &connection.namespace, &connection.decl.target.reference)
                .ok_or_else(|| ValidationError::MissingInputSource {
                    input_id: connection.decl.target.reference.clone(),
                })?;

        for job in jobs.iter_mut().filter(|job| job.producer_name == producer_dotted) {
            if !target_applies_to_job(&connection.decl.target, &connection.namespace, job) {
                continue;
            }

            let binding = resolve_binding(
                flat,
                &connection.namespace,
                &connection.decl.source,
                dim_sizes,
                job,
            )?;

            match binding {
                Binding::Single(id) => {
                    job.input_bindings.insert(input_name.clone(), id.clone());
                    push_declared(job, id);
                }
                Binding::FanIn(members) => {
                    for member in &members {
                        push_declared(job, member.clone());
                    }
                    job.fan_in.insert(input_name.clone(), FanIn { members });
                }
            }

            if let Some(condition) = &connection.decl.condition {
                job.input_conditions.insert(
                    input_name.clone(),
                    InputCondition {
                        condition: condition.clone(),
                        dim_indices: job.dimension_indices.clone(),
                    },
                );
            }
        }
    }
    Ok(())
}

fn push_declared(job: &mut Job, id: String) {
    if !job.declared_inputs.contains(&id) {
        job.declared_inputs.push(id);
    }
}

fn target_applies_to_job(target: &Endpoint, namespace: &[String], job: &Job) -> bool {
    for selector in &target.dims {
        if let DimSelector::Pin(dim_local, expected) = selector {
            let dotted_dim = join_dotted(namespace, dim_local);
            match job.dimension_indices.get(&dotted_dim) {
                Some(actual) if *actual == *expected => {}
                _ => return false,
            }
        }
    }
    true
}

enum Binding {
    Single(String),
    FanIn(Vec<String>),
}

fn resolve_binding(
    flat: &FlatBlueprint,
    namespace: &[String],
    source: &Endpoint,
    dim_sizes: &BTreeMap<String, u32>,
    job: &Job,
) -> Result<Binding, ValidationError> {
    let resolved = resolve_source(flat, namespace, &source.reference).ok_or_else(|| {
        ValidationError::MissingInputSource { input_id: source.reference.clone() }
    })?;

    if resolved.kind == ReferenceKind::Input {
        if !source.dims.is_empty() {
            return Err(ValidationError::GraphExpansionError {
                reason: format!(
                    "input reference {} cannot carry dimension selectors",
                    resolved.dotted_name
                ),
            });
        }
        return Ok(Binding::Single(format!("Input:{}", resolved.dotted_name)));
    }

    let collect_dim = source.dims.iter().find_map(|selector| match selector {
        DimSelector::Collect(dim_local) => Some(join_dotted(namespace, dim_local)),
        _ => None,
    });

    let Some(collect_dotted) = collect_dim else {
        let ordinals = resolve_fixed_ordinals(namespace, &source.dims, job)?;
        let id = format!("Artifact:{}{}", resolved.dotted_name, DimIndices::Ordinal(ordinals));
        return Ok(Binding::Single(id));
    };

    let size = *dim_sizes.get(&collect_dotted).ok_or_else(|| {
        let (ns, loop_name) = collect_dotted
            .rsplit_once('.')
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .unwrap_or_else(|| (String::new(), collect_dotted.clone()));
        ValidationError::MissingDimensionSize { namespace: ns, loop_name }
    })?;

    let mut members = Vec::with_capacity(size as usize);
    for ordinal in 0..size {
        let ordinals = resolve_fixed_ordinals_with_override(
            namespace,
            &source.dims,
            job,
            &collect_dotted,
            ordinal,
        )?;
        members.push(format!("Artifact:{}{}", resolved.dotted_name, DimIndices::Ordinal(ordinals)));
    }
    Ok(Binding::FanIn(members))
}

fn resolve_fixed_ordinals(
    namespace: &[String],
    selectors: &[DimSelector],
    job: &Job,
) -> Result<Vec<u32>, ValidationError> {
    let mut ordinals = Vec::with_capacity(selectors.len());
    for selector in selectors {
        ordinals.push(resolve_one_ordinal(namespace, selector, job)?);
    }
    Ok(ordinals)
}

fn resolve_fixed_ordinals_with_override(
    namespace: &[String],
    selectors: &[DimSelector],
    job: &Job,
    override_dim: &str,
    override_value: u32,
) -> Result<Vec<u32>, ValidationError> {
    let mut ordinals = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let dotted = selector_dim(namespace, selector);
        if dotted == override_dim {
            ordinals.push(override_value);
        } else {
            ordinals.push(resolve_one_ordinal(namespace, selector, job)?);
        }
    }
    Ok(ordinals)
}

fn selector_dim(namespace: &[String], selector: &DimSelector) -> String {
    match selector {
        DimSelector::Free(name) | DimSelector::Pin(name, _) | DimSelector::Collect(name) => {
            join_dotted(namespace, name)
        }
    }
}

fn resolve_one_ordinal(
    namespace: &[String],
    selector: &DimSelector,
    job: &Job,
) -> Result<u32, ValidationError> {
    match selector {
        DimSelector::Pin(_, value) => Ok(*value),
        DimSelector::Free(dim_local) => {
            let dotted = join_dotted(namespace, dim_local);
            job.dimension_indices.get(&dotted).copied().ok_or_else(|| {
                ValidationError::GraphExpansionError {
                    reason: format!("job {} has no ordinal for dimension {dotted}", job.job_id),
                }
            })
        }
        DimSelector::Collect(dim_local) => Err(ValidationError::GraphExpansionError {
            reason: format!(
                "dimension {} cannot be collected more than once per endpoint",
                join_dotted(namespace, dim_local)
            ),
        }),
    }
}

/// Returns the set of dotted dimension names referenced anywhere in
/// `selectors`, used by the validation pass to flag unreferenced loops.
#[must_use]
pub fn referenced_dims(namespace: &[String], selectors: &[DimSelector]) -> BTreeSet<String> {
    selectors.iter().map(|selector| selector_dim(namespace, selector)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::fanout_producers;
    use crate::flatten::flatten;
    use reelgraph_core::core::blueprint::ArtifactDecl;
    use reelgraph_core::core::blueprint::BlueprintNode;
    use reelgraph_core::core::blueprint::ConnectionDecl;
    use reelgraph_core::core::blueprint::InputDecl;
    use reelgraph_core::core::blueprint::ModelHint;
    use reelgraph_core::core::blueprint::ProducerDecl;

    fn sample_blueprint() -> BlueprintNode {
        let mut root = BlueprintNode::default();
        root.inputs.push(InputDecl { name: "Topic".to_string(), default: None });
        root.producers.push(ProducerDecl {
            name: "Writer".to_string(),
            inputs: vec!["Topic".to_string()],
            produces: vec!["Script".to_string()],
            model: ModelHint::default(),
            loop_membership: Vec::new(),
        });
        root.artifacts.push(ArtifactDecl { name: "Script".to_string(), mime_type: None });
        root.connections.push(ConnectionDecl {
            source: Endpoint { reference: "Topic".to_string(), dims: Vec::new() },
            target: Endpoint { reference: "Writer.Topic".to_string(), dims: Vec::new() },
            condition: None,
        });
        root
    }

    #[test]
    fn binds_simple_input_to_producer() {
        let root = sample_blueprint();
        let flat = flatten(&root);
        let mut jobs = fanout_producers(&flat, &BTreeMap::new()).unwrap_or_else(|_| panic!("fanout"));
        connect(&flat, &BTreeMap::new(), &mut jobs).unwrap_or_else(|_| panic!("connect"));

        let job = &jobs[0];
        assert_eq!(job.input_bindings.get("Topic"), Some(&"Input:Topic".to_string()));
        assert!(job.declared_inputs.contains(&"Input:Topic".to_string()));
    }
}

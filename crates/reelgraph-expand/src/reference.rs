// crates/reelgraph-expand/src/reference.rs
// ============================================================================
// Module: Reelgraph Reference Resolution
// Description: Resolves a connection endpoint's dotted reference against the
//              flattened declaration registry.
// Purpose: Implement the namespace-relative-then-absolute lookup convention
//          used for every cross-scope reference in a blueprint: connection
//          endpoints and loop `countInput`s alike.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! A reference is resolved by first trying it relative to the namespace it
//! was written in (`namespace.reference`), then as an absolute dotted path
//! from the root. This lets a child node refer to its own locally-declared
//! names with a short reference while still allowing a reference to reach
//! up to an ancestor or a sibling scope by spelling out the full path.

use crate::flatten::FlatBlueprint;
use crate::flatten::join_dotted;

/// What kind of declaration a reference resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Resolved to a top-level input declaration.
    Input,
    /// Resolved to an artifact declaration.
    Artifact,
}

/// The result of resolving a reference: its dotted name and what kind of
/// declaration it named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// The dotted name the reference resolved to.
    pub dotted_name: String,
    /// Whether it resolved to an input or an artifact.
    pub kind: ReferenceKind,
}

/// Resolves `reference`, declared under `namespace`, against `flat`'s
/// artifact and input registries. Tries the namespace-relative form first,
/// then the reference as given (absolute).
#[must_use]
pub fn resolve_source(
    flat: &FlatBlueprint,
    namespace: &[String],
    reference: &str,
) -> Option<ResolvedReference> {
    let relative = join_dotted(namespace, reference);
    for candidate in [relative.as_str(), reference] {
        if flat.artifacts.contains_key(candidate) {
            return Some(ResolvedReference {
                dotted_name: candidate.to_string(),
                kind: ReferenceKind::Artifact,
            });
        }
        if flat.inputs.contains_key(candidate) {
            return Some(ResolvedReference {
                dotted_name: candidate.to_string(),
                kind: ReferenceKind::Input,
            });
        }
    }
    None
}

/// Resolves a connection target's reference to the producer that declared
/// the consuming input and the input's local name, by finding the longest
/// producer-name prefix of the (namespace-joined) reference.
#[must_use]
pub fn resolve_target_input(
    flat: &FlatBlueprint,
    namespace: &[String],
    reference: &str,
) -> Option<(String, String)> {
    let relative = join_dotted(namespace, reference);
    for candidate in [relative.as_str(), reference] {
        if let Some((producer_name, input_name)) = candidate.rsplit_once('.') {
            if flat.producers.contains_key(producer_name) {
                return Some((producer_name.to_string(), input_name.to_string()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use reelgraph_core::core::blueprint::ArtifactDecl;
    use reelgraph_core::core::blueprint::BlueprintNode;
    use reelgraph_core::core::blueprint::ModelHint;
    use reelgraph_core::core::blueprint::ProducerDecl;

    #[test]
    fn resolves_namespace_relative_artifact_before_absolute() {
        let mut child = BlueprintNode::default();
        child.artifacts.push(ArtifactDecl { name: "Script".to_string(), mime_type: None });
        let mut root = BlueprintNode::default();
        root.children.insert("Chapter1".to_string(), child);
        let flat = flatten(&root);

        let resolved = resolve_source(&flat, &["Chapter1".to_string()], "Script")
            .unwrap_or_else(|| panic!("resolve"));
        assert_eq!(resolved.dotted_name, "Chapter1.Script");
        assert_eq!(resolved.kind, ReferenceKind::Artifact);
    }

    #[test]
    fn resolves_target_input_by_longest_producer_prefix() {
        let mut root = BlueprintNode::default();
        root.producers.push(ProducerDecl {
            name: "Img".to_string(),
            inputs: vec!["Prompt".to_string()],
            produces: Vec::new(),
            model: ModelHint::default(),
            loop_membership: Vec::new(),
        });
        let flat = flatten(&root);

        let (producer, input) = resolve_target_input(&flat, &[], "Img.Prompt")
            .unwrap_or_else(|| panic!("resolve"));
        assert_eq!(producer, "Img");
        assert_eq!(input, "Prompt");
    }
}

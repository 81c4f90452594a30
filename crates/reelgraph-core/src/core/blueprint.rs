// crates/reelgraph-core/src/core/blueprint.rs
// ============================================================================
// Module: Reelgraph Blueprint
// Description: The in-memory blueprint tree consumed by the graph expander.
// Purpose: Define the rooted tree of nodes the engine expands into a flat
//          job list. YAML/TOML parsing into this shape happens outside core.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A blueprint is a rooted tree: each node declares its own inputs,
//! artifacts, loops, producers, and connections, plus a map of nested child
//! blueprints under a local alias. Cross-scope references are resolved by
//! the expander; the tree itself holds only string names and stays free of
//! owning pointers so it can live in an arena.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A reference to a count used to size a loop dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountInputRef {
    /// The input id (relative to the declaring node's namespace) whose
    /// integer value sizes this loop.
    pub count_input: String,
}

/// A named loop dimension declared on a blueprint node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDecl {
    /// The loop's local name, e.g. `Segments`.
    pub name: String,
    /// How this loop's size is determined.
    pub count: CountInputRef,
}

/// A declared input slot on a blueprint node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDecl {
    /// Local name of this input.
    pub name: String,
    /// Default value, used when no override is supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A declared artifact slot on a blueprint node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDecl {
    /// Local name of this artifact.
    pub name: String,
    /// Declared MIME type of the produced payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A model/provider hint attached to a producer declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModelHint {
    /// Provider identifier, e.g. `openai`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model identifier, e.g. `gpt-4o`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A producer declaration: a unit of computation bound to a provider/model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerDecl {
    /// Local name of this producer.
    pub name: String,
    /// Local input names this producer declares it consumes.
    pub inputs: Vec<String>,
    /// Local artifact names this producer declares it produces.
    pub produces: Vec<String>,
    /// Provider/model hint.
    #[serde(default)]
    pub model: ModelHint,
    /// Loop names (in the declaring node's scope) this producer fans out
    /// over, in outer-to-inner order.
    #[serde(default)]
    pub loop_membership: Vec<String>,
}

/// A dimension selector attached to a connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimSelector {
    /// `[dim]`: free, expand across this dimension.
    Free(String),
    /// `[dim=const]`: pin to one concrete ordinal.
    Pin(String, u32),
    /// `[dim=*]`: fan-in, collect every member over this dimension.
    Collect(String),
}

/// One side of a connection edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Dotted reference, resolved relative to the declaring node's
    /// namespace by the expander.
    pub reference: String,
    /// Dimension selectors attached to this endpoint.
    #[serde(default)]
    pub dims: Vec<DimSelector>,
}

/// A single comparator clause in a condition expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionClause {
    /// The resolved path this clause reads, e.g.
    /// `DocProducer.VideoScript.Segments[segment].NarrationType`.
    pub when: String,
    /// Equality comparator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is: Option<Value>,
    /// Inequality comparator.
    #[serde(skip_serializing_if = "Option::is_none", rename = "isNot")]
    pub is_not: Option<Value>,
    /// Containment comparator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<Value>,
    /// Greater-than comparator.
    #[serde(skip_serializing_if = "Option::is_none", rename = "greaterThan")]
    pub greater_than: Option<Value>,
    /// Less-than comparator.
    #[serde(skip_serializing_if = "Option::is_none", rename = "lessThan")]
    pub less_than: Option<Value>,
    /// Greater-or-equal comparator.
    #[serde(skip_serializing_if = "Option::is_none", rename = "greaterOrEqual")]
    pub greater_or_equal: Option<Value>,
    /// Less-or-equal comparator.
    #[serde(skip_serializing_if = "Option::is_none", rename = "lessOrEqual")]
    pub less_or_equal: Option<Value>,
    /// Existence comparator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    /// Regex comparator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
}

/// A group of clauses combined by `all` (AND) or `any` (OR); a bare array is
/// implicit AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionExpr {
    /// A single comparator clause.
    Clause(ConditionClause),
    /// Implicit-AND array of sub-expressions.
    ImplicitAll(Vec<ConditionExpr>),
    /// Explicit `all` (AND) group.
    All {
        /// Sub-expressions, all of which must be satisfied.
        all: Vec<ConditionExpr>,
    },
    /// Explicit `any` (OR) group.
    Any {
        /// Sub-expressions, at least one of which must be satisfied.
        any: Vec<ConditionExpr>,
    },
}

/// A directed edge between two endpoints, with an optional attached
/// condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDecl {
    /// The upstream endpoint.
    pub source: Endpoint,
    /// The downstream endpoint.
    pub target: Endpoint,
    /// A condition gating whether this edge's binding is materialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionExpr>,
}

/// A single blueprint node: the declarations local to one namespace level,
/// plus nested children under a local alias.
///
/// # Invariants
/// - `children` keys are local aliases, unique within this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlueprintNode {
    /// Declared inputs.
    #[serde(default)]
    pub inputs: Vec<InputDecl>,
    /// Declared artifacts.
    #[serde(default)]
    pub artifacts: Vec<ArtifactDecl>,
    /// Declared loop dimensions.
    #[serde(default)]
    pub loops: Vec<LoopDecl>,
    /// Declared producers.
    #[serde(default)]
    pub producers: Vec<ProducerDecl>,
    /// Declared connections.
    #[serde(default)]
    pub connections: Vec<ConnectionDecl>,
    /// Nested child blueprints, keyed by local alias.
    #[serde(default)]
    pub children: BTreeMap<String, BlueprintNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_bare_array_condition_as_implicit_all() {
        let json = serde_json::json!([
            {"when": "A.B", "is": "x"},
            {"when": "A.C", "exists": true}
        ]);
        let expr: ConditionExpr = serde_json::from_value(json).unwrap_or(ConditionExpr::ImplicitAll(Vec::new()));
        match expr {
            ConditionExpr::ImplicitAll(clauses) => assert_eq!(clauses.len(), 2),
            other => panic!("expected implicit-all, got {other:?}"),
        }
    }

    #[test]
    fn default_node_has_no_children() {
        let node = BlueprintNode::default();
        assert!(node.children.is_empty());
    }
}

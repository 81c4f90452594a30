// crates/reelgraph-expand/src/flatten.rs
// ============================================================================
// Module: Reelgraph Blueprint Flattening
// Description: Walks a blueprint tree depth-first, assigning each node's
//              declarations their fully dotted namespace path.
// Purpose: Turn the tree (which may hold owned nested children) into a flat
//          registry the rest of the expander can index by dotted name,
//          without ever holding a pointer back into the tree.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! Every declaration in the tree — input, artifact, loop, producer,
//! connection — is paired with the dotted namespace path of the node that
//! declared it. The flattened registry never borrows from the tree it was
//! built from; each entry owns its own dotted name and a clone of its
//! declaration, which keeps later passes (fanout, connection resolution)
//! free to operate over a flat arena instead of an owning-pointer tree.

use std::collections::BTreeMap;

use reelgraph_core::core::blueprint::ArtifactDecl;
use reelgraph_core::core::blueprint::BlueprintNode;
use reelgraph_core::core::blueprint::ConnectionDecl;
use reelgraph_core::core::blueprint::InputDecl;
use reelgraph_core::core::blueprint::LoopDecl;
use reelgraph_core::core::blueprint::ProducerDecl;

/// A producer declaration paired with its dotted namespace path.
#[derive(Debug, Clone)]
pub struct FlatProducer {
    /// Dotted namespace the producer was declared in (may be empty at root).
    pub namespace: Vec<String>,
    /// The producer declaration itself.
    pub decl: ProducerDecl,
}

impl FlatProducer {
    /// The producer's fully dotted name, e.g. `Chapter1.ImagePromptGenerator`.
    #[must_use]
    pub fn dotted_name(&self) -> String {
        join_dotted(&self.namespace, &self.decl.name)
    }
}

/// A connection declaration paired with the namespace it was declared in,
/// used to resolve its endpoints relative to that scope.
#[derive(Debug, Clone)]
pub struct FlatConnection {
    /// Dotted namespace the connection was declared in.
    pub namespace: Vec<String>,
    /// The connection declaration itself.
    pub decl: ConnectionDecl,
}

/// The flattened form of a blueprint tree.
#[derive(Debug, Clone, Default)]
pub struct FlatBlueprint {
    /// Every producer, keyed by its dotted name.
    pub producers: BTreeMap<String, FlatProducer>,
    /// Every artifact declaration, keyed by its dotted name.
    pub artifacts: BTreeMap<String, ArtifactDecl>,
    /// Every input declaration, keyed by its dotted name.
    pub inputs: BTreeMap<String, InputDecl>,
    /// Every loop declaration, keyed by its dotted name.
    pub loops: BTreeMap<String, LoopDecl>,
    /// Every connection, in declaration order.
    pub connections: Vec<FlatConnection>,
}

/// Flattens a blueprint tree, depth-first, assigning dotted namespace paths.
#[must_use]
pub fn flatten(root: &BlueprintNode) -> FlatBlueprint {
    let mut flat = FlatBlueprint::default();
    flatten_node(root, &mut Vec::new(), &mut flat);
    flat
}

fn flatten_node(node: &BlueprintNode, namespace: &mut Vec<String>, flat: &mut FlatBlueprint) {
    for input in &node.inputs {
        flat.inputs.insert(join_dotted(namespace, &input.name), input.clone());
    }
    for artifact in &node.artifacts {
        flat.artifacts.insert(join_dotted(namespace, &artifact.name), artifact.clone());
    }
    for loop_decl in &node.loops {
        flat.loops.insert(join_dotted(namespace, &loop_decl.name), loop_decl.clone());
    }
    for producer in &node.producers {
        let dotted = join_dotted(namespace, &producer.name);
        flat.producers
            .insert(dotted, FlatProducer { namespace: namespace.clone(), decl: producer.clone() });
    }
    for connection in &node.connections {
        flat.connections
            .push(FlatConnection { namespace: namespace.clone(), decl: connection.clone() });
    }
    for (alias, child) in &node.children {
        namespace.push(alias.clone());
        flatten_node(child, namespace, flat);
        namespace.pop();
    }
}

/// Joins a namespace path and a local name into one dotted string.
#[must_use]
pub fn join_dotted(namespace: &[String], name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", namespace.join("."))
    }
}

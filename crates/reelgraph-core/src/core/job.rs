// crates/reelgraph-core/src/core/job.rs
// ============================================================================
// Module: Reelgraph Job Graph
// Description: The flat producer graph the expander emits, and the layered
//              execution plan the planner emits over it.
// Purpose: Shared domain types consumed by reelgraph-expand, reelgraph-plan,
//          and reelgraph-dispatch.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The expander turns a [`crate::core::blueprint::BlueprintNode`] tree into a
//! flat [`Job`] list; the planner turns that list plus a prior manifest into
//! a [`Plan`] of ordered layers. Canonical identifiers are carried as their
//! formatted string form here, matching how they appear in the event log and
//! manifest, and re-parsed with [`crate::core::ids::CanonicalId`] only where
//! structure (namespace, dims) is actually needed.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::blueprint::ConditionExpr;
use crate::core::blueprint::ModelHint;
use crate::core::time::Timestamp;

/// A condition attached to one of a job's declared inputs, plus the
/// dimension indices in effect when it was attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputCondition {
    /// The gating expression.
    pub condition: ConditionExpr,
    /// Dimension indices captured at attachment time, for placeholder
    /// substitution during evaluation.
    pub dim_indices: BTreeMap<String, u32>,
}

/// A fan-in collector: one job input that gathers every member artifact over
/// a collected dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanIn {
    /// Canonical artifact ids of every collected member, in dimension order.
    pub members: Vec<String>,
}

/// One concrete, fanned-out unit of work in the producer graph.
///
/// # Invariants
/// - Every entry in `declared_inputs` is either an `Input:` id present in
///   the consolidated input set, or an `Artifact:` id produced by some job
///   in the graph (checked by the expander's validation pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Canonical `Producer:` id, unique within the graph.
    pub job_id: String,
    /// The producer's dotted name (without dimension brackets).
    pub producer_name: String,
    /// Suggested layer from blueprint structure alone, before planning.
    pub layer_hint: u32,
    /// Provider/model hint for this producer.
    pub model: ModelHint,
    /// Canonical ids of every input this job declares.
    pub declared_inputs: Vec<String>,
    /// Canonical ids of every artifact this job produces.
    pub produces: Vec<String>,
    /// Local input name to resolved canonical id.
    pub input_bindings: BTreeMap<String, String>,
    /// Conditions gating individual declared inputs, keyed by input id.
    #[serde(default)]
    pub input_conditions: BTreeMap<String, InputCondition>,
    /// Fan-in collectors, keyed by the consuming input's id.
    #[serde(default)]
    pub fan_in: BTreeMap<String, FanIn>,
    /// This job's concrete position in every loop it fans out over.
    pub dimension_indices: BTreeMap<String, u32>,
}

impl Job {
    /// True when this job has at least one fan-in input.
    #[must_use]
    pub fn has_fan_in(&self) -> bool {
        !self.fan_in.is_empty()
    }
}

/// A scheduled or skipped job, as recorded in a [`Plan`] layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlannedJob {
    /// A job that will be dispatched.
    Scheduled(Job),
    /// A job skipped for traceability, e.g. below a `reRunFrom` cut, with the
    /// reason recorded.
    Skipped {
        /// The job that would have run.
        job: Job,
        /// Why it was skipped.
        reason: String,
    },
}

impl PlannedJob {
    /// Returns the underlying job regardless of scheduled/skipped state.
    #[must_use]
    pub const fn job(&self) -> &Job {
        match self {
            Self::Scheduled(job) | Self::Skipped { job, .. } => job,
        }
    }
}

/// An ordered execution plan: disjoint layers of jobs, ready to dispatch.
///
/// # Invariants
/// - Every input of a job in layer `k` is either an `Input:` id, or an
///   `Artifact:` id produced by some job in a layer `< k`, or present in the
///   base manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// The revision this plan will produce once executed.
    pub revision: crate::core::manifest::Revision,
    /// SHA-256 of the manifest this plan is based on, for the hash-chain
    /// check at save time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_base_hash: Option<String>,
    /// Disjoint, topologically ordered layers of planned jobs.
    pub layers: Vec<Vec<PlannedJob>>,
    /// When this plan was constructed.
    pub created_at: Timestamp,
    /// Total layer count implied purely by blueprint structure, before
    /// `reRunFrom`/`upToLayer` slicing.
    pub blueprint_layer_count: u32,
}

impl Plan {
    /// Total scheduled (non-skipped) job count across every layer.
    #[must_use]
    pub fn scheduled_job_count(&self) -> usize {
        self.layers
            .iter()
            .flatten()
            .filter(|job| matches!(job, PlannedJob::Scheduled(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(id: &str) -> Job {
        Job {
            job_id: id.to_string(),
            producer_name: "P".to_string(),
            layer_hint: 0,
            model: ModelHint::default(),
            declared_inputs: Vec::new(),
            produces: Vec::new(),
            input_bindings: BTreeMap::new(),
            input_conditions: BTreeMap::new(),
            fan_in: BTreeMap::new(),
            dimension_indices: BTreeMap::new(),
        }
    }

    #[test]
    fn scheduled_job_count_excludes_skipped() {
        let plan = Plan {
            revision: crate::core::manifest::Revision::from_number(1),
            manifest_base_hash: None,
            layers: vec![vec![
                PlannedJob::Scheduled(sample_job("Producer:A")),
                PlannedJob::Skipped { job: sample_job("Producer:B"), reason: "cut".to_string() },
            ]],
            created_at: Timestamp::from_unix_millis(0),
            blueprint_layer_count: 1,
        };
        assert_eq!(plan.scheduled_job_count(), 1);
    }

    #[test]
    fn has_fan_in_reflects_collectors() {
        let mut job = sample_job("Producer:A");
        assert!(!job.has_fan_in());
        job.fan_in.insert(
            "Input:A.B".to_string(),
            FanIn { members: vec!["Artifact:A.B[0]".to_string()] },
        );
        assert!(job.has_fan_in());
    }
}

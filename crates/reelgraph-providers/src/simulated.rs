// crates/reelgraph-providers/src/simulated.rs
// ============================================================================
// Module: Simulated Producer
// Description: Schema-free, deterministic mock producer for dry-run plans
//              and conditional-branch testing.
// Purpose: Exercise plan structure and condition evaluation without any
//          external network call.
// Dependencies: reelgraph-core, serde_json
// ============================================================================

//! ## Overview
//! Every produced artifact gets a deterministic JSON mock value. When an
//! artifact's bare kind is registered via [`SimulatedProducer::with_alternating`],
//! its value cycles through the registered list by the job's first
//! dimension ordinal (`values[i % values.len()]`), so a blueprint branching
//! on that artifact's value sees every branch exercised across a loop.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reelgraph_core::core::error::ProviderError;
use reelgraph_core::core::event::ArtefactStatus;
use reelgraph_core::core::ids::extract_kind;
use reelgraph_core::interfaces::ProduceRequest;
use reelgraph_core::interfaces::ProduceResult;
use reelgraph_core::interfaces::ProducedArtefact;
use reelgraph_core::interfaces::ProducedBlob;
use reelgraph_core::interfaces::ProducedData;
use reelgraph_core::interfaces::Producer;
use serde_json::Value;
use serde_json::json;

/// A mock [`Producer`] that never calls out to a network.
///
/// # Invariants
/// - `produce` always returns `Ok`; it never reports a provider failure
///   unless explicitly configured via [`SimulatedProducer::always_fail`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedProducer {
    /// Cycling mock values keyed by artifact kind.
    alternating: BTreeMap<String, Vec<Value>>,
    /// Artifact kinds forced to report `failed`, keyed to a diagnostic.
    fail_kinds: BTreeMap<String, String>,
}

impl SimulatedProducer {
    /// A simulated producer with no alternation and no forced failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cycling value list for an artifact's bare kind (its
    /// dotted name with brackets stripped).
    #[must_use]
    pub fn with_alternating(mut self, artifact_kind: impl Into<String>, values: Vec<Value>) -> Self {
        self.alternating.insert(artifact_kind.into(), values);
        self
    }

    /// Forces every job producing an artifact of `artifact_kind` to report
    /// `failed`, for exercising upstream-failure propagation in tests.
    #[must_use]
    pub fn always_fail(mut self, artifact_kind: impl Into<String>, reason: impl Into<String>) -> Self {
        self.fail_kinds.insert(artifact_kind.into(), reason.into());
        self
    }

    fn mock_value(&self, artifact_id: &str, ordinal: Option<u32>) -> Value {
        let kind = extract_kind(artifact_id).unwrap_or_else(|_| artifact_id.to_string());
        if let Some(values) = self.alternating.get(&kind)
            && !values.is_empty()
        {
            let index = ordinal.unwrap_or(0) as usize % values.len();
            return values[index].clone();
        }
        json!({ "simulated": true, "artifactId": artifact_id })
    }
}

#[async_trait]
impl Producer for SimulatedProducer {
    async fn produce(&self, request: ProduceRequest) -> Result<ProduceResult, ProviderError> {
        let ordinal = request.job.dimension_indices.values().next().copied();

        let mut artefacts = Vec::with_capacity(request.job.produces.len());
        let mut overall_status = ArtefactStatus::Succeeded;

        for artifact_id in &request.job.produces {
            let kind = extract_kind(artifact_id).unwrap_or_else(|_| artifact_id.clone());
            if let Some(reason) = self.fail_kinds.get(&kind) {
                overall_status = ArtefactStatus::Failed;
                artefacts.push(ProducedArtefact {
                    artefact_id: artifact_id.clone(),
                    status: ArtefactStatus::Failed,
                    blob: None,
                    diagnostics: Some(reason.clone()),
                });
                continue;
            }
            artefacts.push(ProducedArtefact {
                artefact_id: artifact_id.clone(),
                status: ArtefactStatus::Succeeded,
                blob: Some(ProducedBlob {
                    data: ProducedData::Json(self.mock_value(artifact_id, ordinal)),
                    mime_type: "application/json".to_string(),
                }),
                diagnostics: None,
            });
        }

        Ok(ProduceResult { status: overall_status, artefacts })
    }
}

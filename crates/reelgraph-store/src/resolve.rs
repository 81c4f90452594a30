// crates/reelgraph-store/src/resolve.rs
// ============================================================================
// Module: Reelgraph Artifact Resolver
// Description: Materializes declared job inputs from the event log + blob
//              store.
// Purpose: Give the dispatcher decoded payloads keyed by both the full
//          canonical id and the bare kind, for canonical and legacy lookups.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! Resolution is a single streaming pass over `artefacts.log`, keeping only
//! the latest succeeded event per requested artifact id. Each resolved blob
//! is decoded by its declared MIME type and indexed under two keys: its full
//! canonical id, and its bare two-segment kind (the key the condition
//! evaluator looks artifacts up by).

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;

use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::event::ArtefactEvent;
use reelgraph_core::core::event::ArtefactStatus;
use reelgraph_core::core::ids::extract_kind;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::DecodedPayload;
use reelgraph_core::interfaces::EventLog;

/// A resolved artifact: its decoded payload plus the event it came from.
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    /// The decoded payload.
    pub payload: DecodedPayload,
    /// The artefact event this payload was resolved from.
    pub event: ArtefactEvent,
}

/// Resolves the latest succeeded payload for each of `artifact_ids`.
///
/// # Errors
///
/// Returns [`RuntimeError`] if the event log or blob store cannot be read.
pub async fn resolve_artifacts_from_event_log(
    event_log: &Arc<dyn EventLog>,
    blob_store: &Arc<dyn BlobStore>,
    movie_id: &str,
    artifact_ids: &[String],
) -> Result<BTreeMap<String, ResolvedArtifact>, RuntimeError> {
    let wanted: HashSet<&str> = artifact_ids.iter().map(String::as_str).collect();
    let latest = event_log.latest_succeeded_per_artefact(movie_id).await?;

    let mut resolved = BTreeMap::new();
    for (artefact_id, event) in latest {
        if !wanted.contains(artefact_id.as_str()) {
            continue;
        }
        let Some(blob) = &event.output else {
            continue;
        };
        let payload = blob_store.read_decoded(&blob.hash, &blob.mime_type).await?;
        let kind = extract_kind(&artefact_id)
            .map(|kind| kind)
            .unwrap_or_else(|_| artefact_id.clone());
        resolved.insert(
            artefact_id.clone(),
            ResolvedArtifact { payload: payload.clone(), event: event.clone() },
        );
        resolved.entry(kind).or_insert(ResolvedArtifact { payload, event });
    }
    Ok(resolved)
}

/// Finds the latest event for each of `artifact_ids` whose status is
/// `failed`, used to short-circuit downstream jobs.
///
/// # Errors
///
/// Returns [`RuntimeError`] if the event log cannot be read.
pub async fn find_failed_artefacts(
    event_log: &Arc<dyn EventLog>,
    movie_id: &str,
    artifact_ids: &[String],
) -> Result<Vec<ArtefactEvent>, RuntimeError> {
    let wanted: HashSet<&str> = artifact_ids.iter().map(String::as_str).collect();
    let latest = event_log.any_latest_per_artefact(movie_id).await?;
    Ok(latest
        .into_values()
        .filter(|event| wanted.contains(event.artefact_id.as_str()))
        .filter(|event| event.status == ArtefactStatus::Failed)
        .collect())
}

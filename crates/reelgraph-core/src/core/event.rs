// crates/reelgraph-core/src/core/event.rs
// ============================================================================
// Module: Reelgraph Events
// Description: Append-only event records for inputs and artefacts.
// Purpose: Define the on-disk JSONL record shapes written by the event log.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every movie keeps two append-only logs: one for input edits, one for
//! artefact outcomes. Records are tagged sum types rather than loosely typed
//! JSON blobs, so a malformed discriminant is caught at parse time instead of
//! propagating as a missing-field bug downstream.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::time::Timestamp;

/// A single recorded input value.
///
/// # Invariants
/// - `revision` increases monotonically per `id` within one movie's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Canonical `Input:` identifier.
    pub id: String,
    /// The raw input payload.
    pub payload: Value,
    /// Content digest of `payload`'s canonical JSON form.
    pub payload_digest: HashDigest,
    /// Movie-local revision this input value belongs to.
    pub revision: String,
    /// When this event was appended.
    pub created_at: Timestamp,
}

/// Outcome of a produced artefact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtefactStatus {
    /// The producer returned a usable result.
    Succeeded,
    /// The producer failed or threw.
    Failed,
    /// The job was skipped (condition unsatisfied or upstream failure).
    Skipped,
}

/// The produced payload reference for a succeeded artefact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Content hash of the blob.
    pub hash: HashDigest,
    /// Size in bytes.
    pub size: u64,
    /// Declared MIME type.
    pub mime_type: String,
}

/// A single recorded artefact outcome.
///
/// # Invariants
/// - `output` is `Some` only when `status == Succeeded`.
/// - `edited_by` is set only by a user-edit event, and is cleared by a
///   subsequent restore event that re-points `output` to `original_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtefactEvent {
    /// Canonical `Artifact:` identifier.
    pub artefact_id: String,
    /// Movie-local revision this outcome belongs to.
    pub revision: String,
    /// Content digest of the resolved input set that produced this output.
    pub inputs_hash: HashDigest,
    /// The produced blob, present only when `status == Succeeded`.
    pub output: Option<BlobRef>,
    /// The outcome of this attempt.
    pub status: ArtefactStatus,
    /// The job id that produced this event.
    pub produced_by: String,
    /// When this event was appended.
    pub created_at: Timestamp,
    /// Set to `"user"` when this event overrides producer output by hand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    /// The hash this event restores when it is a restore event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<HashDigest>,
}

impl ArtefactEvent {
    /// True when this event is authoritative for its artifact id, i.e. the
    /// latest-succeeded-wins rule treats it as a candidate.
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self.status, ArtefactStatus::Succeeded)
    }

    /// True when a prior user edit still governs this artifact's output
    /// (no restore event has re-pointed it to `original_hash`).
    #[must_use]
    pub fn is_user_edited(&self) -> bool {
        self.edited_by.as_deref() == Some("user")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hashing::hash_bytes;
    use serde_json::json;

    fn sample_event(status: ArtefactStatus) -> ArtefactEvent {
        ArtefactEvent {
            artefact_id: "Artifact:P.X".to_string(),
            revision: "rev-0001".to_string(),
            inputs_hash: hash_bytes(b"inputs"),
            output: None,
            status,
            produced_by: "Producer:P".to_string(),
            created_at: Timestamp::from_unix_millis(0),
            edited_by: None,
            original_hash: None,
        }
    }

    #[test]
    fn succeeded_event_is_succeeded() {
        assert!(sample_event(ArtefactStatus::Succeeded).is_succeeded());
        assert!(!sample_event(ArtefactStatus::Skipped).is_succeeded());
    }

    #[test]
    fn user_edit_detection() {
        let mut event = sample_event(ArtefactStatus::Succeeded);
        assert!(!event.is_user_edited());
        event.edited_by = Some("user".to_string());
        assert!(event.is_user_edited());
    }

    #[test]
    fn input_event_round_trips_through_json() {
        let event = InputEvent {
            id: "Input:A.B".to_string(),
            payload: json!({"value": 1}),
            payload_digest: hash_bytes(b"{}"),
            revision: "rev-0001".to_string(),
            created_at: Timestamp::from_unix_millis(0),
        };
        let serialized = serde_json::to_string(&event).unwrap_or_default();
        let back: InputEvent = serde_json::from_str(&serialized).unwrap_or(event.clone());
        assert_eq!(back.id, event.id);
    }
}

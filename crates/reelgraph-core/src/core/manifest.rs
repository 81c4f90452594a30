// crates/reelgraph-core/src/core/manifest.rs
// ============================================================================
// Module: Reelgraph Manifest
// Description: Point-in-time snapshot of a movie's latest inputs + artefacts.
// Purpose: Define the hash-chained manifest record and its revision tokens.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A manifest is a snapshot of the latest input and artefact state for one
//! movie, at one revision. Each manifest links to its predecessor by the
//! SHA-256 hash of the predecessor's canonical serialization, forming a hash
//! chain that `saveManifest` verifies before writing the next revision.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::ArtefactStatus;
use crate::core::hashing::HashDigest;
use crate::core::time::Timestamp;

/// A monotonically increasing manifest revision token, `rev-NNNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u32);

impl Revision {
    /// The revision assigned before any manifest has been written.
    pub const INITIAL: Self = Self(0);

    /// Wraps a raw revision number.
    #[must_use]
    pub const fn from_number(number: u32) -> Self {
        Self(number)
    }

    /// Returns the next revision in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw revision number.
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev-{:04}", self.0)
    }
}

/// The recorded state of one input at the manifest's revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestInputEntry {
    /// Content digest of the input's canonical payload.
    pub payload_digest: HashDigest,
}

/// The recorded state of one artefact at the manifest's revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestArtefactEntry {
    /// The produced blob reference, when the artefact succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<crate::core::event::BlobRef>,
    /// The latest known status for this artefact.
    pub status: ArtefactStatus,
    /// When this entry's underlying event was recorded.
    pub created_at: Timestamp,
    /// Set when a user edit currently governs this artefact's output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_by: Option<String>,
    /// The original producer-generated hash, preserved across edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_hash: Option<HashDigest>,
}

/// Run configuration captured alongside a manifest, for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Concurrency limit used for this run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    /// The `reRunFrom` layer used for this run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub re_run_from: Option<u32>,
    /// The `upToLayer` bound used for this run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub up_to_layer: Option<u32>,
}

/// A point-in-time snapshot of a movie's inputs and artefacts.
///
/// # Invariants
/// - `revision = baseRevision.next()` whenever `baseRevision` is present.
/// - Serializing with [`crate::core::hashing::canonical_json_bytes`] over
///   this type's `serde_json::Value` form produces the hash chained to by
///   the following manifest's `manifestBaseHash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// This manifest's own revision.
    pub revision: Revision,
    /// The revision this manifest was derived from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_revision: Option<Revision>,
    /// When this manifest was written.
    pub created_at: Timestamp,
    /// Latest known input state, keyed by canonical input id.
    pub inputs: BTreeMap<String, ManifestInputEntry>,
    /// Latest known artefact state, keyed by canonical artefact id.
    pub artefacts: BTreeMap<String, ManifestArtefactEntry>,
    /// Run configuration used to produce this manifest, if recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_config: Option<RunConfig>,
}

impl Manifest {
    /// Serializes this manifest to its canonical JSON byte form.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        crate::core::hashing::canonical_json_bytes(&value)
    }

    /// Hashes this manifest's canonical byte form.
    #[must_use]
    pub fn content_hash(&self) -> HashDigest {
        crate::core::hashing::hash_bytes(&self.canonical_bytes())
    }
}

/// The on-disk pointer file, `current.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CurrentPointer {
    /// The latest written revision, or `None` before any manifest exists or
    /// mid-execution after a crash.
    pub revision: Option<Revision>,
    /// Path to the manifest file for `revision`, relative to the movie root.
    pub manifest_path: Option<String>,
}

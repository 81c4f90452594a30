// crates/reelgraph-store/src/manifest.rs
// ============================================================================
// Module: Reelgraph Filesystem Manifest Service
// Description: Hash-chained manifest persistence and `current.json` pointer
//              rotation for one movie.
// Purpose: Implement `reelgraph_core::interfaces::ManifestService`.
// Dependencies: reelgraph-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! Manifests are written once per revision under `manifests/rev-NNNN.json`
//! and never mutated afterward. `current.json` is the single pointer a
//! reader follows to find the latest one; it is rewritten last, after the
//! manifest file itself lands on disk, so a crash between the two leaves
//! `current.json` pointing at the prior (still valid) revision.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::hashing::HashDigest;
use reelgraph_core::core::hashing::hash_bytes;
use reelgraph_core::core::manifest::CurrentPointer;
use reelgraph_core::core::manifest::Manifest;
use reelgraph_core::core::manifest::ManifestArtefactEntry;
use reelgraph_core::core::manifest::ManifestInputEntry;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::interfaces::EventLog;
use reelgraph_core::interfaces::ManifestService;

/// A [`ManifestService`] backed by `current.json` and `manifests/*.json`.
pub struct FsManifestService {
    /// The movie's root directory (parent of `manifests/` and `current.json`).
    root: PathBuf,
    /// The event log used to rebuild a manifest purely from recorded events.
    event_log: Arc<dyn EventLog>,
}

impl FsManifestService {
    /// Opens a manifest service rooted at `movie_root`, replaying through
    /// `event_log` when asked to rebuild from events.
    #[must_use]
    pub fn new(movie_root: impl Into<PathBuf>, event_log: Arc<dyn EventLog>) -> Self {
        Self { root: movie_root.into(), event_log }
    }

    fn current_json_path(&self) -> PathBuf {
        self.root.join("current.json")
    }

    fn manifest_path(&self, revision: Revision) -> PathBuf {
        self.root.join("manifests").join(format!("{revision}.json"))
    }

    async fn read_manifest_file(&self, path: &PathBuf) -> Result<Manifest, RuntimeError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: "manifest".to_string() })?;
        serde_json::from_slice(&bytes)
            .map_err(|_| RuntimeError::InvalidJsonArtifact { artifact_id: "manifest".to_string() })
    }

    async fn write_atomic(path: &PathBuf, bytes: &[u8]) -> Result<(), RuntimeError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                RuntimeError::ArtifactResolutionFailed { artifact_id: "manifest".to_string() }
            })?;
        }
        let tmp = path
            .with_extension(format!("tmp-{}.{}", std::process::id(), crate::tmp::unique_suffix()));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: "manifest".to_string() })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: "manifest".to_string() })
    }
}

#[async_trait]
impl ManifestService for FsManifestService {
    async fn load_current(
        &self,
        movie_id: &str,
    ) -> Result<Option<(Manifest, HashDigest)>, RuntimeError> {
        let pointer = self.read_pointer(movie_id).await?;
        let Some(revision) = pointer.revision else {
            return Ok(None);
        };
        let manifest = self.read_manifest_file(&self.manifest_path(revision)).await?;
        let hash = manifest.content_hash();
        Ok(Some((manifest, hash)))
    }

    async fn save_manifest(
        &self,
        _movie_id: &str,
        manifest: &Manifest,
        previous_hash: Option<&HashDigest>,
    ) -> Result<HashDigest, RuntimeError> {
        if let Some(expected) = previous_hash {
            let pointer_path = self.current_json_path();
            let pointer: CurrentPointer = match tokio::fs::read(&pointer_path).await {
                Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
                Err(_) => CurrentPointer::default(),
            };
            if let Some(revision) = pointer.revision {
                let on_disk = self.read_manifest_file(&self.manifest_path(revision)).await?;
                let found = on_disk.content_hash();
                if &found != expected {
                    return Err(RuntimeError::ManifestHashConflict {
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
            }
        }

        let manifest_path = self.manifest_path(manifest.revision);
        Self::write_atomic(&manifest_path, &manifest.canonical_bytes()).await?;

        let pointer = CurrentPointer {
            revision: Some(manifest.revision),
            manifest_path: Some(
                manifest_path
                    .strip_prefix(&self.root)
                    .unwrap_or(&manifest_path)
                    .to_string_lossy()
                    .replace('\\', "/"),
            ),
        };
        let pointer_bytes = serde_json::to_vec(&pointer).map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: "current.json".to_string() }
        })?;
        Self::write_atomic(&self.current_json_path(), &pointer_bytes).await?;

        Ok(manifest.content_hash())
    }

    async fn rebuild_from_events(&self, movie_id: &str) -> Result<Manifest, RuntimeError> {
        let pointer = self.read_pointer(movie_id).await?;
        let revision = pointer.revision.unwrap_or(Revision::INITIAL);

        let mut inputs = std::collections::BTreeMap::new();
        let mut latest_created_at = reelgraph_core::core::time::Timestamp::from_unix_millis(0);
        let mut input_stream = self.event_log.stream_inputs(movie_id).await?;
        while let Some(event) = input_stream.next().await {
            let event = event?;
            if event.created_at > latest_created_at {
                latest_created_at = event.created_at;
            }
            inputs.insert(event.id, ManifestInputEntry { payload_digest: event.payload_digest });
        }

        let mut artefacts = std::collections::BTreeMap::new();
        for event in self.event_log.latest_succeeded_per_artefact(movie_id).await? {
            let (id, succeeded) = event;
            if succeeded.created_at > latest_created_at {
                latest_created_at = succeeded.created_at;
            }
            artefacts.insert(
                id,
                ManifestArtefactEntry {
                    blob: succeeded.output,
                    status: succeeded.status,
                    created_at: succeeded.created_at,
                    edited_by: succeeded.edited_by,
                    original_hash: succeeded.original_hash,
                },
            );
        }

        Ok(Manifest {
            revision,
            base_revision: None,
            created_at: latest_created_at,
            inputs,
            artefacts,
            run_config: None,
        })
    }

    async fn read_pointer(&self, _movie_id: &str) -> Result<CurrentPointer, RuntimeError> {
        match tokio::fs::read(self.current_json_path()).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
            Err(_) => Ok(CurrentPointer::default()),
        }
    }
}

/// Hashes a manifest's canonical byte form, for callers outside this crate
/// that only have the bytes (e.g. recovery tooling).
#[must_use]
pub fn hash_manifest_bytes(bytes: &[u8]) -> HashDigest {
    hash_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::interfaces::EventLog;

    struct EmptyEventLog;

    #[async_trait]
    impl EventLog for EmptyEventLog {
        async fn append_input(
            &self,
            _movie_id: &str,
            _event: reelgraph_core::core::event::InputEvent,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn append_artefact(
            &self,
            _movie_id: &str,
            _event: reelgraph_core::core::event::ArtefactEvent,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn stream_inputs(
            &self,
            _movie_id: &str,
        ) -> Result<
            futures::stream::BoxStream<'static, Result<reelgraph_core::core::event::InputEvent, RuntimeError>>,
            RuntimeError,
        > {
            Ok(futures::stream::empty().boxed())
        }

        async fn stream_artefacts(
            &self,
            _movie_id: &str,
        ) -> Result<
            futures::stream::BoxStream<
                'static,
                Result<reelgraph_core::core::event::ArtefactEvent, RuntimeError>,
            >,
            RuntimeError,
        > {
            Ok(futures::stream::empty().boxed())
        }
    }

    #[tokio::test]
    async fn rebuild_from_empty_log_yields_empty_manifest() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let service = FsManifestService::new(dir.path(), Arc::new(EmptyEventLog));
        let manifest =
            service.rebuild_from_events("movie-1").await.unwrap_or_else(|_| panic!("rebuild"));
        assert!(manifest.inputs.is_empty());
        assert!(manifest.artefacts.is_empty());
    }

    #[tokio::test]
    async fn load_current_is_none_before_any_save() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let service = FsManifestService::new(dir.path(), Arc::new(EmptyEventLog));
        let loaded = service.load_current("movie-1").await.unwrap_or_else(|_| panic!("load"));
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let service = FsManifestService::new(dir.path(), Arc::new(EmptyEventLog));
        let manifest = Manifest {
            revision: Revision::from_number(1),
            base_revision: None,
            created_at: reelgraph_core::core::time::Timestamp::from_unix_millis(0),
            inputs: std::collections::BTreeMap::new(),
            artefacts: std::collections::BTreeMap::new(),
            run_config: None,
        };
        service.save_manifest("movie-1", &manifest, None).await.unwrap_or_else(|_| panic!("save"));
        let (loaded, _hash) =
            service.load_current("movie-1").await.unwrap_or_else(|_| panic!("load")).unwrap_or_else(|| panic!("expected manifest"));
        assert_eq!(loaded.revision, manifest.revision);
    }

    #[tokio::test]
    async fn save_with_wrong_previous_hash_conflicts() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let service = FsManifestService::new(dir.path(), Arc::new(EmptyEventLog));
        let first = Manifest {
            revision: Revision::from_number(1),
            base_revision: None,
            created_at: reelgraph_core::core::time::Timestamp::from_unix_millis(0),
            inputs: std::collections::BTreeMap::new(),
            artefacts: std::collections::BTreeMap::new(),
            run_config: None,
        };
        service.save_manifest("movie-1", &first, None).await.unwrap_or_else(|_| panic!("save"));

        let second = Manifest { revision: Revision::from_number(2), ..first };
        let bogus_hash = hash_bytes(b"not the real predecessor");
        let result = service.save_manifest("movie-1", &second, Some(&bogus_hash)).await;
        assert!(matches!(result, Err(RuntimeError::ManifestHashConflict { .. })));
    }
}

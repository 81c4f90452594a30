// crates/reelgraph-store/src/blobs.rs
// ============================================================================
// Module: Reelgraph Filesystem Blob Store
// Description: SHA-256 keyed, write-once blob storage under `blobs/<hh>/`.
// Purpose: Implement `reelgraph_core::interfaces::BlobStore` against a local
//          directory tree.
// Dependencies: reelgraph-core, tokio
// ============================================================================

//! ## Overview
//! Blobs are written once, keyed by the SHA-256 hash of their content.
//! Writing the same bytes twice is idempotent: the second call finds the
//! file already present and returns the same `{hash, size}` without
//! touching disk again. Writes land in a sibling temp file first, then are
//! renamed into place, so a crash mid-write never leaves a partial blob
//! visible at its final path.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::hashing::HashDigest;
use reelgraph_core::core::hashing::hash_bytes;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::DecodedPayload;
use reelgraph_core::interfaces::WrittenBlob;

use crate::mime::extension_for;

/// A [`BlobStore`] backed by a local `blobs/` directory tree.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    /// The movie's `blobs/` directory.
    root: PathBuf,
}

impl FsBlobStore {
    /// Opens a blob store rooted at `blobs_dir`. The directory is created
    /// lazily on first write.
    #[must_use]
    pub fn new(blobs_dir: impl Into<PathBuf>) -> Self {
        Self { root: blobs_dir.into() }
    }

    fn shard_dir(&self, hash: &HashDigest) -> PathBuf {
        self.root.join(hash.shard_prefix())
    }

    fn extensioned_path(&self, hash: &HashDigest, mime_type: Option<&str>) -> PathBuf {
        let dir = self.shard_dir(hash);
        match mime_type.and_then(extension_for) {
            Some(ext) => dir.join(format!("{hash}.{ext}")),
            None => dir.join(hash.to_string()),
        }
    }

    async fn resolve_existing_path(&self, hash: &HashDigest) -> Option<PathBuf> {
        let dir = self.shard_dir(hash);
        let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.as_ref() == hash.as_str() || name.starts_with(&format!("{hash}.")) {
                return Some(entry.path());
            }
        }
        None
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, bytes: &[u8], mime_type: &str) -> Result<WrittenBlob, RuntimeError> {
        let hash = hash_bytes(bytes);
        if let Some(_existing) = self.resolve_existing_path(&hash).await {
            return Ok(WrittenBlob { hash, size: bytes.len() as u64 });
        }

        let dir = self.shard_dir(&hash);
        tokio::fs::create_dir_all(&dir).await.map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: hash.to_string() }
        })?;

        let final_path = self.extensioned_path(&hash, Some(mime_type));
        let tmp_path =
            dir.join(format!("{hash}.tmp-{}.{}", std::process::id(), crate::tmp::unique_suffix()));
        tokio::fs::write(&tmp_path, bytes).await.map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: hash.to_string() }
        })?;
        tokio::fs::rename(&tmp_path, &final_path).await.map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: hash.to_string() }
        })?;

        Ok(WrittenBlob { hash, size: bytes.len() as u64 })
    }

    async fn read(
        &self,
        hash: &HashDigest,
        mime_type: Option<&str>,
    ) -> Result<Vec<u8>, RuntimeError> {
        let path = self.locate(hash, mime_type).await?;
        tokio::fs::read(&path)
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: hash.to_string() })
    }

    async fn read_decoded(
        &self,
        hash: &HashDigest,
        mime_type: &str,
    ) -> Result<DecodedPayload, RuntimeError> {
        let bytes = self.read(hash, Some(mime_type)).await?;
        if mime_type == "application/json" {
            let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|_| {
                RuntimeError::InvalidJsonArtifact { artifact_id: hash.to_string() }
            })?;
            return Ok(DecodedPayload::Json(value));
        }
        if mime_type.starts_with("text/") {
            let text = String::from_utf8(bytes).map_err(|_| {
                RuntimeError::ArtifactResolutionFailed { artifact_id: hash.to_string() }
            })?;
            return Ok(DecodedPayload::Text(text));
        }
        Ok(DecodedPayload::Bytes(bytes))
    }

    async fn exists(&self, hash: &HashDigest) -> Result<bool, RuntimeError> {
        Ok(self.resolve_existing_path(hash).await.is_some())
    }
}

impl FsBlobStore {
    async fn locate(
        &self,
        hash: &HashDigest,
        mime_type: Option<&str>,
    ) -> Result<PathBuf, RuntimeError> {
        let preferred = self.extensioned_path(hash, mime_type);
        if tokio_fs_exists(&preferred).await {
            return Ok(preferred);
        }
        self.resolve_existing_path(hash)
            .await
            .ok_or_else(|| RuntimeError::ArtifactResolutionFailed { artifact_id: hash.to_string() })
    }
}

async fn tokio_fs_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_is_idempotent_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let store = FsBlobStore::new(dir.path());
        let first = store.write(b"hello", "text/plain").await.unwrap_or_else(|_| panic!("write"));
        let second =
            store.write(b"hello", "text/plain").await.unwrap_or_else(|_| panic!("write"));
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.size, second.size);
    }

    #[tokio::test]
    async fn round_trips_json_payload() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let store = FsBlobStore::new(dir.path());
        let written = store
            .write(br#"{"a":1}"#, "application/json")
            .await
            .unwrap_or_else(|_| panic!("write"));
        let decoded = store
            .read_decoded(&written.hash, "application/json")
            .await
            .unwrap_or_else(|_| panic!("read_decoded"));
        assert_eq!(decoded, DecodedPayload::Json(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn exists_is_false_before_write() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let store = FsBlobStore::new(dir.path());
        let hash = hash_bytes(b"nope");
        assert!(!store.exists(&hash).await.unwrap_or(true));
    }
}

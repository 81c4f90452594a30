// crates/reelgraph-store/src/movie.rs
// ============================================================================
// Module: Reelgraph Movie Storage
// Description: Filesystem layout and lifecycle for one movie's storage
//              subtree.
// Purpose: Implement `initializeMovieStorage` and the path conventions every
//          other module in this crate builds on.
// Dependencies: reelgraph-core, tokio
// ============================================================================

//! ## Overview
//! A movie's storage lives at `<storageRoot>/<basePath>/<movieId>/`, with
//! `current.json`, `manifests/`, `events/`, and `blobs/` as its only
//! top-level entries. [`initialize_movie_storage`] is idempotent: calling it
//! against an already-initialized movie is a no-op beyond ensuring the
//! directories still exist.

use std::path::Path;
use std::path::PathBuf;

use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::manifest::CurrentPointer;

/// Resolves the four conventional subpaths for a movie rooted at
/// `storage_root`.
#[derive(Debug, Clone)]
pub struct MoviePaths {
    /// `<storageRoot>/<basePath>/<movieId>/`
    pub root: PathBuf,
}

impl MoviePaths {
    /// Builds the conventional path set for `movie_id` under `storage_root`
    /// and `base_path`.
    #[must_use]
    pub fn new(storage_root: &Path, base_path: &str, movie_id: &str) -> Self {
        Self { root: storage_root.join(base_path).join(movie_id) }
    }

    /// `current.json`'s path.
    #[must_use]
    pub fn current_json(&self) -> PathBuf {
        self.root.join("current.json")
    }

    /// `manifests/`'s path.
    #[must_use]
    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    /// `events/`'s path.
    #[must_use]
    pub fn events_dir(&self) -> PathBuf {
        self.root.join("events")
    }

    /// `blobs/`'s path.
    #[must_use]
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }
}

/// Creates a movie's storage subtree, writing `current.json` with a null
/// revision if it does not already exist.
///
/// # Errors
///
/// Returns [`RuntimeError::ArtifactResolutionFailed`] if any directory or
/// file write fails.
pub async fn initialize_movie_storage(paths: &MoviePaths) -> Result<(), RuntimeError> {
    for dir in [paths.manifests_dir(), paths.events_dir(), paths.blobs_dir()] {
        tokio::fs::create_dir_all(&dir).await.map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: "movie storage".to_string() }
        })?;
    }

    let current_path = paths.current_json();
    if tokio::fs::metadata(&current_path).await.is_err() {
        let pointer = CurrentPointer::default();
        let bytes = serde_json::to_vec(&pointer).map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: "current.json".to_string() }
        })?;
        tokio::fs::write(&current_path, bytes).await.map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: "current.json".to_string() }
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialization_creates_conventional_layout() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let paths = MoviePaths::new(dir.path(), "movies", "movie-1");
        initialize_movie_storage(&paths).await.unwrap_or_else(|_| panic!("initialize"));
        assert!(tokio::fs::metadata(paths.manifests_dir()).await.is_ok());
        assert!(tokio::fs::metadata(paths.events_dir()).await.is_ok());
        assert!(tokio::fs::metadata(paths.blobs_dir()).await.is_ok());
        assert!(tokio::fs::metadata(paths.current_json()).await.is_ok());
    }

    #[tokio::test]
    async fn initialization_is_idempotent() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let paths = MoviePaths::new(dir.path(), "movies", "movie-1");
        initialize_movie_storage(&paths).await.unwrap_or_else(|_| panic!("initialize"));
        initialize_movie_storage(&paths).await.unwrap_or_else(|_| panic!("initialize again"));
    }
}

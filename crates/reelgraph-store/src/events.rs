// crates/reelgraph-store/src/events.rs
// ============================================================================
// Module: Reelgraph Filesystem Event Log
// Description: Append-only JSONL logs for inputs and artefacts.
// Purpose: Implement `reelgraph_core::interfaces::EventLog` against two flat
//          files per movie.
// Dependencies: reelgraph-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! Each movie keeps `events/inputs.log` and `events/artefacts.log`: one JSON
//! record per line, written in append mode and fsynced best-effort.
//! Streaming a log is a single forward pass; a malformed trailing line
//! (e.g. a process killed mid-write) is skipped rather than treated as a
//! fatal error, so a crash never blocks replay of everything written before
//! it.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reelgraph_core::core::error::RuntimeError;
use reelgraph_core::core::event::ArtefactEvent;
use reelgraph_core::core::event::InputEvent;
use reelgraph_core::interfaces::EventLog;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::Lines;

/// An [`EventLog`] backed by `inputs.log`/`artefacts.log` flat files.
#[derive(Debug, Clone)]
pub struct FsEventLog {
    /// The movie's `events/` directory.
    root: PathBuf,
}

impl FsEventLog {
    /// Opens an event log rooted at `events_dir`.
    #[must_use]
    pub fn new(events_dir: impl Into<PathBuf>) -> Self {
        Self { root: events_dir.into() }
    }

    fn inputs_path(&self, _movie_id: &str) -> PathBuf {
        self.root.join("inputs.log")
    }

    fn artefacts_path(&self, _movie_id: &str) -> PathBuf {
        self.root.join("artefacts.log")
    }

    async fn append_line(path: &Path, line: &str) -> Result<(), RuntimeError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: line.to_string() })?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: line.to_string() })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: line.to_string() })?;
        file.write_all(b"\n")
            .await
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: line.to_string() })?;
        let _ = file.sync_all().await;
        Ok(())
    }

}

/// The state a lazily-unfolded line stream walks through: the file hasn't
/// been opened yet, is open and has lines left, or is exhausted.
enum LineReadState {
    /// Not yet opened.
    Unopened(PathBuf),
    /// Open, reading lines one at a time.
    Opened(Lines<tokio::io::BufReader<tokio::fs::File>>),
    /// Exhausted, or the file never existed.
    Done,
}

/// Lazily streams deserialized records from a JSONL file, one line read at a
/// time; a missing file streams empty, a malformed line is skipped.
fn lazy_lines<T>(path: PathBuf) -> BoxStream<'static, Result<T, RuntimeError>>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    futures::stream::unfold(LineReadState::Unopened(path), |mut state| async move {
        loop {
            match state {
                LineReadState::Unopened(path) => {
                    state = match tokio::fs::File::open(&path).await {
                        Ok(file) => LineReadState::Opened(tokio::io::BufReader::new(file).lines()),
                        Err(_) => LineReadState::Done,
                    };
                }
                LineReadState::Opened(mut lines) => match lines.next_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<T>(&line) {
                        Ok(parsed) => return Some((Ok(parsed), LineReadState::Opened(lines))),
                        Err(_) => state = LineReadState::Opened(lines),
                    },
                    Ok(None) | Err(_) => state = LineReadState::Done,
                },
                LineReadState::Done => return None,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl EventLog for FsEventLog {
    async fn append_input(&self, movie_id: &str, event: InputEvent) -> Result<(), RuntimeError> {
        let line = serde_json::to_string(&event)
            .map_err(|_| RuntimeError::ArtifactResolutionFailed { artifact_id: event.id.clone() })?;
        Self::append_line(&self.inputs_path(movie_id), &line).await
    }

    async fn append_artefact(
        &self,
        movie_id: &str,
        event: ArtefactEvent,
    ) -> Result<(), RuntimeError> {
        let line = serde_json::to_string(&event).map_err(|_| {
            RuntimeError::ArtifactResolutionFailed { artifact_id: event.artefact_id.clone() }
        })?;
        Self::append_line(&self.artefacts_path(movie_id), &line).await
    }

    async fn stream_inputs(
        &self,
        movie_id: &str,
    ) -> Result<BoxStream<'static, Result<InputEvent, RuntimeError>>, RuntimeError> {
        Ok(lazy_lines(self.inputs_path(movie_id)))
    }

    async fn stream_artefacts(
        &self,
        movie_id: &str,
    ) -> Result<BoxStream<'static, Result<ArtefactEvent, RuntimeError>>, RuntimeError> {
        Ok(lazy_lines(self.artefacts_path(movie_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::event::ArtefactStatus;
    use reelgraph_core::core::hashing::hash_bytes;
    use reelgraph_core::core::time::Timestamp;

    fn sample_artefact(status: ArtefactStatus) -> ArtefactEvent {
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

    #[tokio::test]
    async fn appended_events_round_trip() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let log = FsEventLog::new(dir.path());
        log.append_artefact("movie-1", sample_artefact(ArtefactStatus::Succeeded))
            .await
            .unwrap_or_else(|_| panic!("append"));
        let events: Vec<_> = log
            .stream_artefacts("movie-1")
            .await
            .unwrap_or_else(|_| panic!("stream"))
            .collect()
            .await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn latest_succeeded_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let log = FsEventLog::new(dir.path());
        log.append_artefact("movie-1", sample_artefact(ArtefactStatus::Succeeded))
            .await
            .unwrap_or_else(|_| panic!("append"));
        log.append_artefact("movie-1", sample_artefact(ArtefactStatus::Failed))
            .await
            .unwrap_or_else(|_| panic!("append"));
        let mut third = sample_artefact(ArtefactStatus::Succeeded);
        third.inputs_hash = hash_bytes(b"second-pass");
        log.append_artefact("movie-1", third.clone()).await.unwrap_or_else(|_| panic!("append"));
        let latest = log
            .latest_succeeded_per_artefact("movie-1")
            .await
            .unwrap_or_else(|_| panic!("latest"));
        assert_eq!(latest.get("Artifact:P.X"), Some(&third));
    }

    #[tokio::test]
    async fn missing_log_streams_empty() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let log = FsEventLog::new(dir.path());
        let events: Vec<_> = log
            .stream_artefacts("movie-1")
            .await
            .unwrap_or_else(|_| panic!("stream"))
            .collect()
            .await;
        assert!(events.is_empty());
    }
}

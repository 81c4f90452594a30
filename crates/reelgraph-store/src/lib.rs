// crates/reelgraph-store/src/lib.rs
// ============================================================================
// Crate: reelgraph-store
// Description: Filesystem-backed blob store, event log, manifest service,
//              and artifact resolver for one movie's storage subtree.
// ============================================================================

//! ## Overview
//! This crate is the only place in the engine that touches a filesystem
//! directly. It implements the trait boundaries defined in
//! `reelgraph_core::interfaces` against the layout from the external
//! interfaces design: `current.json`, `manifests/`, `events/`, `blobs/`.

pub mod blobs;
pub mod events;
pub mod manifest;
pub mod mime;
pub mod movie;
pub mod resolve;
mod tmp;

pub use blobs::FsBlobStore;
pub use events::FsEventLog;
pub use manifest::FsManifestService;
pub use movie::MoviePaths;
pub use movie::initialize_movie_storage;

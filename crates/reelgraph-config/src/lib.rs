// crates/reelgraph-config/src/lib.rs
// ============================================================================
// Crate: reelgraph-config
// Description: Typed, validated engine configuration loaded from TOML.
// ============================================================================

//! ## Overview
//! [`EngineConfig`] covers the engine's own runtime knobs: how many jobs a
//! layer may run at once, where movie storage lives, and which providers the
//! dispatcher's [`reelgraph_providers::ProducerRegistry`] is allowed to
//! route to. Blueprint authoring (YAML/TOML graph definitions) is a
//! separate, out-of-scope concern; this crate only validates the engine's
//! own process configuration.

mod config;

pub use config::ConfigError;
pub use config::EngineConfig;
pub use config::ExecutionConfig;
pub use config::ProvidersConfig;
pub use config::StorageConfig;

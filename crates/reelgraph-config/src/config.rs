// crates/reelgraph-config/src/config.rs
// ============================================================================
// Module: Reelgraph Engine Configuration
// Description: Configuration loading and validation for the planning and
//              dispatch engine.
// Purpose: Provide strict, fail-closed config parsing with sane limits.
// Dependencies: reelgraph-providers, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file, defaulted section by section,
//! then validated as a whole. Missing or invalid configuration fails closed
//! rather than silently falling back to a guessed default.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use reelgraph_providers::ProviderAccessPolicy;
use serde::Deserialize;
use thiserror::Error;

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "reelgraph.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "REELGRAPH_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum total path length accepted anywhere in configuration.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum concurrency a layer may run at once.
pub(crate) const MAX_CONCURRENCY: u32 = 256;
/// Default concurrency when `execution.concurrency` is unset.
pub(crate) const DEFAULT_CONCURRENCY: u32 = 4;
/// Default movie storage root when `storage.root` is unset.
const DEFAULT_STORAGE_ROOT: &str = "./movies";

/// The engine's own runtime configuration: concurrency, storage location,
/// and provider routing policy.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    /// Layer dispatch tunables.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Movie storage location.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Provider routing policy.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl EngineConfig {
    /// Loads configuration from disk using the default resolution rules: an
    /// explicit `path`, then `REELGRAPH_CONFIG`, then `./reelgraph.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is not valid
    /// TOML, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path_string("config path", &resolved.to_string_lossy())?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.execution.validate()?;
        self.storage.validate()?;
        self.providers.validate()?;
        Ok(())
    }

    /// Builds the runtime [`ProviderAccessPolicy`] this configuration
    /// describes.
    #[must_use]
    pub fn provider_policy(&self) -> ProviderAccessPolicy {
        self.providers.to_policy()
    }
}

/// Layer dispatch tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of jobs running at once within a layer.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { concurrency: default_concurrency() }
    }
}

impl ExecutionConfig {
    /// Validates execution tunables.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("execution.concurrency must be greater than zero".to_string()));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "execution.concurrency must not exceed {MAX_CONCURRENCY}"
            )));
        }
        Ok(())
    }
}

/// Movie storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory under which each movie's blobs and event logs live.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: default_storage_root() }
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.root", &self.root.to_string_lossy())
    }
}

/// Provider routing configuration for the dispatcher's producer registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Provider id routed to when a producer declares no hint.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// When non-empty, only these provider ids may be routed to.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Provider ids blocked regardless of the allowlist.
    #[serde(default)]
    pub denylist: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self { default_provider: default_provider(), allowlist: Vec::new(), denylist: Vec::new() }
    }
}

impl ProvidersConfig {
    /// Validates provider routing configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_provider.trim().is_empty() {
            return Err(ConfigError::Invalid("providers.default_provider must be non-empty".to_string()));
        }
        for entry in self.allowlist.iter().chain(self.denylist.iter()) {
            if entry.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "providers allow/deny entries must be non-empty".to_string(),
                ));
            }
        }
        if self.allowlist.contains(&self.default_provider)
            && self.denylist.contains(&self.default_provider)
        {
            return Err(ConfigError::Invalid(
                "providers.default_provider cannot be both allowed and denied".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the runtime access policy this configuration describes.
    fn to_policy(&self) -> ProviderAccessPolicy {
        let base = if self.allowlist.is_empty() {
            ProviderAccessPolicy::allow_all()
        } else {
            ProviderAccessPolicy::allow_only(self.allowlist.clone())
        };
        self.denylist.iter().fold(base, |policy, provider_id| policy.deny(provider_id.clone()))
    }
}

/// Failure loading or validating engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Resolves the configuration path from an explicit override, then the
/// environment, then the default filename.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path-shaped string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Default concurrency when unset.
const fn default_concurrency() -> u32 {
    DEFAULT_CONCURRENCY
}

/// Default storage root when unset.
fn default_storage_root() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_ROOT)
}

/// Default provider id when unset.
fn default_provider() -> String {
    reelgraph_providers::DEFAULT_PROVIDER_ID.to_string()
}

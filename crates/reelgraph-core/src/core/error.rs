// crates/reelgraph-core/src/core/error.rs
// ============================================================================
// Module: Reelgraph Error Taxonomy
// Description: Categorized error types shared across every engine crate.
// Purpose: Give every failure a stable `{code, message}` pair and a
//          category that determines propagation policy.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Errors are grouped into four propagation categories: Parse and
//! Validation abort planning before any job runs; Runtime errors abort a
//! run in progress; Provider errors are captured as artefact failures and
//! never escape the dispatcher boundary. [`EngineError`] is the top-level
//! union a caller at the process boundary (the CLI) matches on.

use crate::core::ids::InvalidCanonicalId;

/// Malformed blueprint or identifier, caught before planning begins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A canonical identifier string failed to parse.
    #[error(transparent)]
    InvalidCanonicalId(#[from] InvalidCanonicalId),
}

impl ParseError {
    /// Stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCanonicalId(_) => "INVALID_CANONICAL_ID",
        }
    }
}

/// Graph-level contract violations discovered during expansion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Alias resolution found a reference cycle.
    #[error("alias cycle detected: {path}")]
    AliasCycleDetected {
        /// The dotted path at which the cycle was detected.
        path: String,
    },
    /// General graph expansion failure not covered by a more specific
    /// variant.
    #[error("graph expansion error: {reason}")]
    GraphExpansionError {
        /// Human-readable explanation.
        reason: String,
    },
    /// A loop's `countInput` did not resolve to a known dimension size.
    #[error("missing dimension size for {namespace}.{loop_name}")]
    MissingDimensionSize {
        /// Namespace the loop is declared in.
        namespace: String,
        /// The loop's local name.
        loop_name: String,
    },
    /// A connection endpoint referenced an id with no source.
    #[error("missing input source for {input_id}")]
    MissingInputSource {
        /// The unresolved input id.
        input_id: String,
    },
    /// The producer-level graph contains a cycle.
    #[error("cyclic dependency involving {job_id}")]
    CyclicDependency {
        /// One job id participating in the cycle.
        job_id: String,
    },
}

impl ValidationError {
    /// Stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AliasCycleDetected { .. } => "ALIAS_CYCLE_DETECTED",
            Self::GraphExpansionError { .. } => "GRAPH_EXPANSION_ERROR",
            Self::MissingDimensionSize { .. } => "MISSING_DIMENSION_SIZE",
            Self::MissingInputSource { .. } => "MISSING_INPUT_SOURCE",
            Self::CyclicDependency { .. } => "CYCLIC_DEPENDENCY",
        }
    }
}

/// Failures discovered while planning or executing a run in progress.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The on-disk manifest hash did not match the expected `previousHash`.
    #[error("manifest hash conflict: expected {expected}, found {found}")]
    ManifestHashConflict {
        /// The hash the caller supplied.
        expected: String,
        /// The hash actually found on disk.
        found: String,
    },
    /// `reRunFrom` was negative or otherwise malformed.
    #[error("invalid reRunFrom value: {value}")]
    InvalidRerunFromValue {
        /// The offending value, as given.
        value: String,
    },
    /// `reRunFrom` exceeded the blueprint's total layer count.
    #[error("reRunFrom {re_run_from} exceeds layer count {layer_count}")]
    RerunFromExceedsLayers {
        /// The requested cut layer.
        re_run_from: u32,
        /// The plan's total blueprint layer count.
        layer_count: u32,
    },
    /// `reRunFrom` was greater than `upToLayer`.
    #[error("reRunFrom {re_run_from} is greater than upToLayer {up_to_layer}")]
    RerunFromGreaterThanUpTo {
        /// The requested cut layer.
        re_run_from: u32,
        /// The requested upper bound layer.
        up_to_layer: u32,
    },
    /// A declared artifact could not be resolved from the event log.
    #[error("artifact resolution failed for {artifact_id}")]
    ArtifactResolutionFailed {
        /// The artifact id that could not be resolved.
        artifact_id: String,
    },
    /// A blob declared as `application/json` did not contain valid JSON.
    #[error("invalid json artifact at {artifact_id}")]
    InvalidJsonArtifact {
        /// The offending artifact id.
        artifact_id: String,
    },
}

impl RuntimeError {
    /// Stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ManifestHashConflict { .. } => "MANIFEST_HASH_CONFLICT",
            Self::InvalidRerunFromValue { .. } => "INVALID_RERUN_FROM_VALUE",
            Self::RerunFromExceedsLayers { .. } => "RERUN_FROM_EXCEEDS_LAYERS",
            Self::RerunFromGreaterThanUpTo { .. } => "RERUN_FROM_GREATER_THAN_UPTO",
            Self::ArtifactResolutionFailed { .. } => "ARTIFACT_RESOLUTION_FAILED",
            Self::InvalidJsonArtifact { .. } => "INVALID_JSON_ARTIFACT",
        }
    }
}

/// A failure while evaluating one condition clause. Aborts only the job
/// whose input it gates; the dispatcher continues other jobs in the layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("condition evaluation error on {when}: {reason}")]
pub struct ConditionError {
    /// The clause's resolved `when` path.
    pub when: String,
    /// Human-readable explanation (e.g. invalid regex).
    pub reason: String,
}

impl ConditionError {
    /// Stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "CONDITION_EVALUATION_ERROR"
    }
}

/// A failure reported by an external producer. Captured as an artefact
/// failure event; never escapes the dispatcher boundary as a hard error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider error for {job_id}: {reason}")]
pub struct ProviderError {
    /// The job whose `produce` call failed.
    pub job_id: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl ProviderError {
    /// Stable error code for this failure.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "PROVIDER_ERROR"
    }
}

/// The top-level error union a caller at the process boundary matches on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A Parse-category failure.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A Validation-category failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A Runtime-category failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// A Condition-category failure.
    #[error(transparent)]
    Condition(#[from] ConditionError),
    /// A Provider-category failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EngineError {
    /// Stable error code for this failure, regardless of category.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(error) => error.code(),
            Self::Validation(error) => error.code(),
            Self::Runtime(error) => error.code(),
            Self::Condition(error) => error.code(),
            Self::Provider(error) => error.code(),
        }
    }

    /// The propagation category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse(_) => ErrorCategory::Parse,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Runtime(_) => ErrorCategory::Runtime,
            Self::Condition(_) => ErrorCategory::Condition,
            Self::Provider(_) => ErrorCategory::Provider,
        }
    }
}

/// The four propagation categories from the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed blueprint or identifier; run aborts before planning.
    Parse,
    /// Graph-level contract violation; run aborts.
    Validation,
    /// Manifest/plan/runtime failure; run aborts.
    Runtime,
    /// Condition clause failure; aborts only the gated job.
    Condition,
    /// Producer failure; captured as a job failure, never escapes.
    Provider,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_reports_category_and_code() {
        let error: EngineError = RuntimeError::ManifestHashConflict {
            expected: "a".to_string(),
            found: "b".to_string(),
        }
        .into();
        assert_eq!(error.category(), ErrorCategory::Runtime);
        assert_eq!(error.code(), "MANIFEST_HASH_CONFLICT");
    }

    #[test]
    fn provider_errors_never_become_validation() {
        let error: EngineError =
            ProviderError { job_id: "Producer:A".to_string(), reason: "boom".to_string() }.into();
        assert_eq!(error.category(), ErrorCategory::Provider);
    }
}

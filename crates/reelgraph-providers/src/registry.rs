// crates/reelgraph-providers/src/registry.rs
// ============================================================================
// Module: Producer Registry
// Description: Dispatches `produce` calls to a registered backend by the
//              job's model hint, with an allow/deny policy over provider
//              ids.
// Purpose: Give the dispatcher one `Producer` to call regardless of how
//          many concrete backends are wired in.
// Dependencies: reelgraph-core
// ============================================================================

//! ## Overview
//! A [`ProducerRegistry`] holds one boxed [`Producer`] per provider id and
//! itself implements [`Producer`], routing each request by
//! `job.model.provider` (defaulting to [`DEFAULT_PROVIDER_ID`] when a
//! producer declares no hint). Live network backends register here under
//! their own provider id; this crate ships only the `simulated` entry.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use async_trait::async_trait;
use reelgraph_core::core::error::ProviderError;
use reelgraph_core::interfaces::ProduceRequest;
use reelgraph_core::interfaces::ProduceResult;
use reelgraph_core::interfaces::Producer;

use crate::simulated::SimulatedProducer;

/// Provider id used when a producer declares no `model.provider` hint.
pub const DEFAULT_PROVIDER_ID: &str = "simulated";

/// Restricts which provider ids a registry will route to, independent of
/// what's registered.
///
/// # Invariants
/// - An empty `allowlist` (`None`) allows every registered provider except
///   those in `denylist`.
#[derive(Debug, Clone, Default)]
pub struct ProviderAccessPolicy {
    /// When present, only these provider ids may be routed to.
    allowlist: Option<BTreeSet<String>>,
    /// Provider ids blocked regardless of the allowlist.
    denylist: BTreeSet<String>,
}

impl ProviderAccessPolicy {
    /// Allows every registered provider.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Restricts routing to exactly `provider_ids`.
    #[must_use]
    pub fn allow_only(provider_ids: impl IntoIterator<Item = String>) -> Self {
        Self { allowlist: Some(provider_ids.into_iter().collect()), denylist: BTreeSet::new() }
    }

    /// Blocks `provider_id` regardless of the allowlist.
    #[must_use]
    pub fn deny(mut self, provider_id: impl Into<String>) -> Self {
        self.denylist.insert(provider_id.into());
        self
    }

    fn is_allowed(&self, provider_id: &str) -> bool {
        if self.denylist.contains(provider_id) {
            return false;
        }
        match &self.allowlist {
            Some(allowed) => allowed.contains(provider_id),
            None => true,
        }
    }
}

/// Routes `produce` calls to a registered backend by provider id.
pub struct ProducerRegistry {
    /// Producer implementations keyed by provider id.
    producers: BTreeMap<String, Box<dyn Producer + Send + Sync>>,
    /// Access control policy for provider routing.
    policy: ProviderAccessPolicy,
}

impl ProducerRegistry {
    /// An empty registry with the given access policy.
    #[must_use]
    pub fn new(policy: ProviderAccessPolicy) -> Self {
        Self { producers: BTreeMap::new(), policy }
    }

    /// A registry pre-populated with [`SimulatedProducer`] under
    /// [`DEFAULT_PROVIDER_ID`], allowing every provider.
    #[must_use]
    pub fn with_builtin_producers() -> Self {
        let mut registry = Self::new(ProviderAccessPolicy::allow_all());
        registry.register_producer(DEFAULT_PROVIDER_ID, Box::new(SimulatedProducer::new()));
        registry
    }

    /// Registers `producer` under `provider_id`, replacing any prior entry.
    pub fn register_producer(&mut self, provider_id: impl Into<String>, producer: Box<dyn Producer + Send + Sync>) {
        self.producers.insert(provider_id.into(), producer);
    }

    /// The access policy this registry enforces.
    #[must_use]
    pub fn policy(&self) -> &ProviderAccessPolicy {
        &self.policy
    }
}

#[async_trait]
impl Producer for ProducerRegistry {
    async fn produce(&self, request: ProduceRequest) -> Result<ProduceResult, ProviderError> {
        let provider_id = request.job.model.provider.as_deref().unwrap_or(DEFAULT_PROVIDER_ID);

        if !self.policy.is_allowed(provider_id) {
            return Err(ProviderError {
                job_id: request.job.job_id.clone(),
                reason: format!("provider {provider_id:?} is not allowed by policy"),
            });
        }

        let producer = self.producers.get(provider_id).ok_or_else(|| ProviderError {
            job_id: request.job.job_id.clone(),
            reason: format!("no producer registered for provider {provider_id:?}"),
        })?;

        producer.produce(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgraph_core::core::blueprint::ModelHint;
    use reelgraph_core::core::job::Job;
    use std::collections::BTreeMap;

    fn job_with_provider(provider: Option<&str>) -> Job {
        Job {
            job_id: "Producer:P".to_string(),
            producer_name: "P".to_string(),
            layer_hint: 0,
            model: ModelHint { provider: provider.map(String::from), model: None },
            declared_inputs: Vec::new(),
            produces: vec!["Artifact:P.X".to_string()],
            input_bindings: BTreeMap::new(),
            input_conditions: BTreeMap::new(),
            fan_in: BTreeMap::new(),
            dimension_indices: BTreeMap::new(),
        }
    }

    fn request(job: Job) -> ProduceRequest {
        ProduceRequest {
            movie_id: "movie-1".to_string(),
            job,
            layer_index: 0,
            attempt: 1,
            revision: "rev-0001".to_string(),
        }
    }

    #[tokio::test]
    async fn routes_unhinted_jobs_to_the_default_provider() {
        let registry = ProducerRegistry::with_builtin_producers();
        let result = registry.produce(request(job_with_provider(None))).await.unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(result.artefacts.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_provider_is_a_provider_error() {
        let registry = ProducerRegistry::with_builtin_producers();
        let err = registry.produce(request(job_with_provider(Some("openai")))).await.unwrap_err();
        assert_eq!(err.code(), "PROVIDER_ERROR");
    }

    #[tokio::test]
    async fn denied_provider_is_rejected_even_if_registered() {
        let mut registry = ProducerRegistry::new(ProviderAccessPolicy::allow_all().deny("simulated"));
        registry.register_producer("simulated", Box::new(SimulatedProducer::new()));
        let err = registry.produce(request(job_with_provider(None))).await.unwrap_err();
        assert_eq!(err.code(), "PROVIDER_ERROR");
    }
}

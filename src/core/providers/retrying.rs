//! Retry decorator for batch adapters
//!
//! Wraps any [`BatchProvider`] and retries transient failures of idempotent
//! calls. `submit` is passed through untouched: a retried create after a lost
//! response would leave a second, untracked remote batch.

use async_trait::async_trait;

use super::base_provider::{
    ArtifactStream, BatchProvider, RemoteBatch, SubmitRequest, SubmittedBatch,
};
use super::unified_provider::ProviderError;
use crate::core::batch::ArtifactKind;
use crate::utils::error::{RetryConfig, RetryPolicy};

pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: BatchProvider> RetryingProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self {
            inner,
            policy: RetryPolicy::new(config),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: BatchProvider> BatchProvider for RetryingProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmittedBatch, ProviderError> {
        self.inner.submit(request).await
    }

    async fn get_status(&self, provider_batch_id: &str) -> Result<RemoteBatch, ProviderError> {
        self.policy
            .call(|| self.inner.get_status(provider_batch_id))
            .await
    }

    async fn fetch_artifact(
        &self,
        provider_batch_id: &str,
        kind: ArtifactKind,
        reference: &str,
    ) -> Result<ArtifactStream, ProviderError> {
        self.policy
            .call(|| self.inner.fetch_artifact(provider_batch_id, kind, reference))
            .await
    }

    async fn cancel(&self, provider_batch_id: &str) -> Result<RemoteBatch, ProviderError> {
        self.policy.call(|| self.inner.cancel(provider_batch_id)).await
    }
}

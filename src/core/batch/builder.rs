//! Wiring of a [`BatchJobManager`] from configuration

use std::sync::Arc;
use tracing::info;

use super::codec::RequestCodec;
use super::manager::BatchJobManager;
use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::core::providers::{OpenAIBatchConfig, OpenAIBatchProvider, RetryingProvider};
use crate::storage::{ArtifactCache, FileJobRegistry, LocalItemStore};
use crate::utils::error::{BatchError, Result, RetryConfig};

/// Build the adapter for the configured remote service
pub fn provider_from_config(config: &ProviderConfig) -> Result<OpenAIBatchProvider> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| BatchError::Config(format!("No API key configured for {}", config.kind)))?;

    let mut batch_config = match config.kind {
        ProviderKind::OpenAI => {
            let openai = OpenAIBatchConfig::openai(api_key);
            match &config.api_base {
                Some(base) => openai.with_api_base(base.clone()),
                None => openai,
            }
        }
        #[cfg(feature = "azure")]
        ProviderKind::Azure => {
            let endpoint = config.api_base.clone().ok_or_else(|| {
                BatchError::Config("Azure requires the resource endpoint in api_base".to_string())
            })?;
            OpenAIBatchConfig::azure(api_key, endpoint, config.api_version.clone())
        }
        #[cfg(not(feature = "azure"))]
        ProviderKind::Azure => {
            return Err(BatchError::Config(
                "azure support is not compiled in".to_string(),
            ));
        }
    };
    batch_config = batch_config
        .with_timeout(config.timeout())
        .with_completion_window(config.completion_window.clone());
    batch_config.organization = config.organization.clone();

    OpenAIBatchProvider::new(batch_config).map_err(|e| BatchError::Config(e.to_string()))
}

/// File-backed manager talking to the configured provider
pub async fn build_manager(config: &Config) -> Result<BatchJobManager> {
    let data_dir = config.storage.data_path();
    let registry = FileJobRegistry::new(&data_dir, config.storage.lock_wait()).await?;
    let provider = RetryingProvider::new(
        provider_from_config(&config.provider)?,
        RetryConfig::from(&config.retry),
    );
    let store = Arc::new(LocalItemStore::new(&data_dir));
    let artifacts = ArtifactCache::new(config.storage.artifacts_path()).await?;

    info!(
        provider = %config.provider.kind,
        data_dir = %data_dir.display(),
        "Batch manager ready"
    );
    Ok(BatchJobManager::new(
        Arc::new(registry),
        Arc::new(provider),
        store.clone(),
        store,
        artifacts,
        RequestCodec::new(config.limits.into()),
    ))
}

//! OpenAI Batch Adapter Configuration

use std::time::Duration;

use crate::core::providers::unified_provider::ProviderError;

/// Default OpenAI API base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// How requests authenticate and which URL layout is used
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderAuth {
    /// `Authorization: Bearer` against the OpenAI URL layout
    Bearer,
    /// `api-key` header against `{endpoint}/openai/...?api-version=`
    #[cfg(feature = "azure")]
    Azure { api_version: String },
}

/// OpenAI batch adapter configuration
#[derive(Debug, Clone)]
pub struct OpenAIBatchConfig {
    pub api_key: String,
    /// API base; for Azure this is the resource endpoint
    pub api_base: String,
    pub auth: ProviderAuth,
    /// Deadline for JSON calls; also the connect timeout and the longest
    /// pause tolerated between artifact chunks
    pub timeout: Duration,
    /// Completion window requested for each batch
    pub completion_window: String,
    /// Optional `OpenAI-Organization` header
    pub organization: Option<String>,
}

impl OpenAIBatchConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            auth: ProviderAuth::Bearer,
            timeout: Duration::from_secs(60),
            completion_window: "24h".to_string(),
            organization: None,
        }
    }

    #[cfg(feature = "azure")]
    pub fn azure(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: endpoint.into(),
            auth: ProviderAuth::Azure {
                api_version: api_version.into(),
            },
            timeout: Duration::from_secs(60),
            completion_window: "24h".to_string(),
            organization: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_completion_window(mut self, window: impl Into<String>) -> Self {
        self.completion_window = window.into();
        self
    }

    /// Adapter name recorded on jobs
    pub fn provider_name(&self) -> &'static str {
        match self.auth {
            ProviderAuth::Bearer => "openai",
            #[cfg(feature = "azure")]
            ProviderAuth::Azure { .. } => "azure",
        }
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        let provider = self.provider_name();
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::configuration(provider, "API key is required"));
        }
        if url::Url::parse(&self.api_base).is_err() {
            return Err(ProviderError::configuration(
                provider,
                format!("invalid API base: {}", self.api_base),
            ));
        }
        if self.completion_window.is_empty() {
            return Err(ProviderError::configuration(
                provider,
                "completion window cannot be empty",
            ));
        }
        Ok(())
    }

    /// Full URL for an API path such as `/batches`
    pub fn url(&self, path: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        match &self.auth {
            ProviderAuth::Bearer => format!("{}{}", base, path),
            #[cfg(feature = "azure")]
            ProviderAuth::Azure { api_version } => {
                format!("{}/openai{}?api-version={}", base, path, api_version)
            }
        }
    }
}

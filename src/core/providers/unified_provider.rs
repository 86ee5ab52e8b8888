//! Unified Provider Error Handling
//!
//! Single error type for every batch adapter. Adapters classify each failure
//! as either transient (safe to retry) or permanent (surface to the caller).
//!
//! | Source | Class |
//! |------|------|
//! | Network / connect failure | Transient |
//! | Timeout | Transient |
//! | HTTP 408, 429, 5xx | Transient |
//! | Other HTTP 4xx, including 409 | Permanent |
//! | Unparseable response | Permanent |
//!
//! ```rust,ignore
//! let err = ProviderError::api_error("openai", 429, "Rate limit reached");
//! assert!(err.is_retryable());
//! ```

use crate::utils::error::Retryable;
use std::time::Duration;

/// Unified provider error type - single error for all batch adapters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("transient failure from {provider}: {message}")]
    Transient {
        provider: &'static str,
        message: String,
        /// Seconds the remote asked us to wait
        retry_after: Option<u64>,
    },

    #[error("{provider} rejected the request{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Permanent {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },
}

impl ProviderError {
    pub fn network(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            provider,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn timeout(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            provider,
            message: format!("timed out: {}", message.into()),
            retry_after: None,
        }
    }

    pub fn permanent(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Permanent {
            provider,
            status: None,
            message: message.into(),
        }
    }

    pub fn response_parsing(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Permanent {
            provider,
            status: None,
            message: format!("unparseable response: {}", message.into()),
        }
    }

    pub fn configuration(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Permanent {
            provider,
            status: None,
            message: format!("configuration: {}", message.into()),
        }
    }

    /// Classify a non-success HTTP response
    pub fn api_error(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::from_status(provider, status, message, None)
    }

    pub fn from_status(
        provider: &'static str,
        status: u16,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        let message = message.into();
        match status {
            408 | 429 | 500..=599 => Self::Transient {
                provider,
                message: format!("HTTP {}: {}", status, message),
                retry_after,
            },
            _ => Self::Permanent {
                provider,
                status: Some(status),
                message,
            },
        }
    }

    /// Classify a transport error from the HTTP client
    pub fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::timeout(provider, err.to_string());
        }
        if err.is_connect() || err.is_request() || err.is_body() {
            return Self::network(provider, err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::api_error(provider, status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::response_parsing(provider, err.to_string());
        }
        Self::permanent(provider, err.to_string())
    }

    pub fn provider(&self) -> &'static str {
        match self {
            Self::Transient { provider, .. } | Self::Permanent { provider, .. } => provider,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// HTTP status of a permanent rejection, when the remote sent one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. } => *status,
            Self::Transient { .. } => None,
        }
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

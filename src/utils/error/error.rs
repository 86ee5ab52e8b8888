//! Error handling for the batch lifecycle manager
//!
//! This module defines all error types returned by manager operations.

use crate::core::batch::BatchStatus;
use crate::core::providers::ProviderError;
use thiserror::Error;

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Main error type for batch operations
#[derive(Error, Debug)]
pub enum BatchError {
    /// Scope resolved to no work items
    #[error("No work items match scope {scope}")]
    EmptySelection { scope: String },

    /// Request file exceeds remote limits; nothing was submitted
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Remote call failed in a way that is safe to retry
    #[error("Transient error for job {job_id} ({provider}): {message}")]
    Transient {
        job_id: String,
        provider: &'static str,
        message: String,
    },

    /// Remote service rejected the operation
    #[error("Remote rejected operation for job {job_id} ({provider}{}): {message}", .status.map(|s| format!(", HTTP {}", s)).unwrap_or_default())]
    Permanent {
        job_id: String,
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Operation not valid for the job's current status
    #[error("Cannot {operation} job {job_id} in status {status}: {reason}")]
    InvalidState {
        job_id: String,
        status: BatchStatus,
        operation: &'static str,
        reason: String,
    },

    /// No record for the job id
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Destructive operation on a live job needs explicit consent
    #[error("Job {job_id} is still {status}; removal requires confirmation")]
    RequiresConfirmation { job_id: String, status: BatchStatus },

    /// Some result lines were malformed
    #[error("Job {job_id}: {count} result line(s) could not be decoded: {}", .keys.join(", "))]
    PartialDecodeFailure {
        job_id: String,
        count: usize,
        keys: Vec<String>,
    },

    /// A record with the same id already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Job registry failures
    #[error("Registry error: {0}")]
    Registry(String),

    /// Artifact cache, item source or result store failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BatchError {
    /// Attach a job id to a provider failure
    pub fn from_provider(job_id: impl Into<String>, error: ProviderError) -> Self {
        match error {
            ProviderError::Transient {
                provider, message, ..
            } => BatchError::Transient {
                job_id: job_id.into(),
                provider,
                message,
            },
            ProviderError::Permanent {
                provider,
                status,
                message,
            } => BatchError::Permanent {
                job_id: job_id.into(),
                provider,
                status,
                message,
            },
        }
    }

    pub fn invalid_state(
        job_id: impl Into<String>,
        status: BatchStatus,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        BatchError::InvalidState {
            job_id: job_id.into(),
            status,
            operation,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BatchError::Transient { .. })
    }
}

impl super::recovery::Retryable for BatchError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

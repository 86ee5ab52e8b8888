//! Provider adapter contract for remote batch services
//!
//! The manager only talks to a remote service through [`BatchProvider`];
//! each service gets one implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

use super::unified_provider::ProviderError;
use crate::core::batch::{ArtifactKind, BatchStatus};

/// Streamed body of a remote artifact
pub type ArtifactStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// Remote status vocabulary shared by OpenAI-compatible batch APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    Validating,
    InProgress,
    Finalizing,
    Completed,
    Failed,
    Expired,
    Cancelling,
    Cancelled,
    /// A status this adapter does not know; never changes local state
    Unknown(String),
}

impl RemoteStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "validating" => RemoteStatus::Validating,
            "in_progress" => RemoteStatus::InProgress,
            "finalizing" => RemoteStatus::Finalizing,
            "completed" => RemoteStatus::Completed,
            "failed" => RemoteStatus::Failed,
            "expired" => RemoteStatus::Expired,
            "cancelling" => RemoteStatus::Cancelling,
            "cancelled" => RemoteStatus::Cancelled,
            other => RemoteStatus::Unknown(other.to_string()),
        }
    }

    /// Local status this remote status reconciles to
    pub fn to_local(&self) -> Option<BatchStatus> {
        match self {
            RemoteStatus::Validating => Some(BatchStatus::Validating),
            RemoteStatus::InProgress => Some(BatchStatus::InProgress),
            RemoteStatus::Finalizing => Some(BatchStatus::Finalizing),
            RemoteStatus::Completed => Some(BatchStatus::Completed),
            RemoteStatus::Failed => Some(BatchStatus::Failed),
            RemoteStatus::Expired => Some(BatchStatus::Expired),
            RemoteStatus::Cancelling | RemoteStatus::Cancelled => Some(BatchStatus::Cancelled),
            RemoteStatus::Unknown(_) => None,
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStatus::Validating => f.write_str("validating"),
            RemoteStatus::InProgress => f.write_str("in_progress"),
            RemoteStatus::Finalizing => f.write_str("finalizing"),
            RemoteStatus::Completed => f.write_str("completed"),
            RemoteStatus::Failed => f.write_str("failed"),
            RemoteStatus::Expired => f.write_str("expired"),
            RemoteStatus::Cancelling => f.write_str("cancelling"),
            RemoteStatus::Cancelled => f.write_str("cancelled"),
            RemoteStatus::Unknown(other) => f.write_str(other),
        }
    }
}

/// Request counts as reported by the remote service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Snapshot of a remote batch
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBatch {
    pub id: String,
    pub status: RemoteStatus,
    pub counts: RequestCounts,
    pub output_file_id: Option<String>,
    pub error_file_id: Option<String>,
    /// Batch-level error messages, verbatim
    pub errors: Vec<String>,
}

impl RemoteBatch {
    pub fn new(id: impl Into<String>, status: RemoteStatus) -> Self {
        Self {
            id: id.into(),
            status,
            counts: RequestCounts::default(),
            output_file_id: None,
            error_file_id: None,
            errors: Vec::new(),
        }
    }
}

/// Request file handed to an adapter for submission
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Local job id, attached to the remote batch as metadata
    pub job_id: String,
    /// Encoded request file
    pub content: Bytes,
    pub filename: String,
    /// Endpoint every request line targets
    pub endpoint: String,
    pub item_count: u64,
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedBatch {
    pub provider_batch_id: String,
    /// Remote handle of the uploaded request file
    pub input_file_id: Option<String>,
    pub remote: RemoteBatch,
}

/// Remote batch service adapter
#[async_trait]
pub trait BatchProvider: Send + Sync {
    /// Short adapter name recorded on each job
    fn name(&self) -> &'static str;

    /// Upload the request file and create the remote batch
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmittedBatch, ProviderError>;

    /// Current remote status and counters
    async fn get_status(&self, provider_batch_id: &str) -> Result<RemoteBatch, ProviderError>;

    /// Stream a result artifact
    async fn fetch_artifact(
        &self,
        provider_batch_id: &str,
        kind: ArtifactKind,
        reference: &str,
    ) -> Result<ArtifactStream, ProviderError>;

    /// Request cancellation; returns the remote state after the request
    async fn cancel(&self, provider_batch_id: &str) -> Result<RemoteBatch, ProviderError>;
}

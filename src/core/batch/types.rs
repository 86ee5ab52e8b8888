//! Batch job types and data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local lifecycle status of a batch job
///
/// `Pending -> Validating -> InProgress -> Finalizing` are the ordered
/// non-terminal stages; `Completed`, `Failed`, `Expired` and `Cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Created locally, remote batch not yet picked up
    Pending,
    /// Remote service is validating the request file
    Validating,
    /// Requests are being processed remotely
    InProgress,
    /// Remote service is writing result files
    Finalizing,
    /// Batch processing completed
    Completed,
    /// Batch failed remotely
    Failed,
    /// Batch did not finish inside its completion window
    Expired,
    /// Batch has been cancelled
    Cancelled,
}

impl BatchStatus {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed
                | BatchStatus::Failed
                | BatchStatus::Expired
                | BatchStatus::Cancelled
        )
    }

    /// Position of a non-terminal stage in the forward order
    fn stage(&self) -> Option<u8> {
        match self {
            BatchStatus::Pending => Some(0),
            BatchStatus::Validating => Some(1),
            BatchStatus::InProgress => Some(2),
            BatchStatus::Finalizing => Some(3),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` follows the lifecycle
    ///
    /// Stages may be skipped (a poll can miss a short-lived stage) but never
    /// revisited, and nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        match (self.stage(), next.stage()) {
            (Some(current), Some(target)) => target > current,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Validating => "validating",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Finalizing => "finalizing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Expired => "expired",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BatchStatus::Pending),
            "validating" => Ok(BatchStatus::Validating),
            "in_progress" | "in-progress" => Ok(BatchStatus::InProgress),
            "finalizing" => Ok(BatchStatus::Finalizing),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            "expired" => Ok(BatchStatus::Expired),
            "cancelled" | "canceled" => Ok(BatchStatus::Cancelled),
            other => Err(format!("unknown batch status: {}", other)),
        }
    }
}

/// Selection criteria a job was built from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobScope {
    /// Organization owning the items
    pub organization: String,
    /// Restrict to one repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Restrict to a single item (requires `repository`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_number: Option<u64>,
}

impl JobScope {
    pub fn organization(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            repository: None,
            item_number: None,
        }
    }

    pub fn repository(organization: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            repository: Some(repository.into()),
            item_number: None,
        }
    }

    pub fn item(
        organization: impl Into<String>,
        repository: impl Into<String>,
        number: u64,
    ) -> Self {
        Self {
            organization: organization.into(),
            repository: Some(repository.into()),
            item_number: Some(number),
        }
    }

    /// Whether an item falls inside this scope
    pub fn contains(&self, item: &ItemRef) -> bool {
        if item.organization != self.organization {
            return false;
        }
        if let Some(repo) = &self.repository {
            if &item.repository != repo {
                return false;
            }
        }
        match self.item_number {
            Some(number) => item.number == number,
            None => true,
        }
    }
}

impl fmt::Display for JobScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.organization)?;
        if let Some(repo) = &self.repository {
            write!(f, "/{}", repo)?;
        }
        if let Some(number) = self.item_number {
            write!(f, "#{}", number)?;
        }
        Ok(())
    }
}

/// Identity of a single work item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemRef {
    pub organization: String,
    pub repository: String,
    pub number: u64,
}

impl ItemRef {
    pub fn new(organization: impl Into<String>, repository: impl Into<String>, number: u64) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            number,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.organization, self.repository, self.number)
    }
}

/// A work item resolved from the item source
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Item identity, used to build the `custom_id`
    pub item: ItemRef,
    /// Request payload; must be a JSON object
    pub payload: serde_json::Value,
}

impl WorkItem {
    pub fn new(item: ItemRef, payload: serde_json::Value) -> Self {
        Self { item, payload }
    }
}

/// Model settings merged into every request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Model name sent to the remote service
    pub model: String,
    /// Remote endpoint each request line targets
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: "/v1/chat/completions".to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Which remote result file an artifact is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Per-item responses
    Output,
    /// Per-item errors
    Error,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Output => f.write_str("output"),
            ArtifactKind::Error => f.write_str("error"),
        }
    }
}

/// Durable record of one batch submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchJob {
    /// Locally generated id
    pub job_id: String,
    /// Remote batch id, set once after submission succeeds
    #[serde(default)]
    pub provider_batch_id: Option<String>,
    /// Adapter that submitted the batch
    pub provider: String,
    /// Work-item schema / prompt template tag
    pub processor_type: String,
    /// Selection criteria, kept for audit
    pub scope: JobScope,
    /// Model the requests were built for
    pub model: String,
    pub status: BatchStatus,
    pub item_count: u64,
    #[serde(default)]
    pub completed_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    /// Local path of the submitted request file
    #[serde(default)]
    pub input_artifact_ref: Option<String>,
    /// SHA-256 of the submitted request file
    #[serde(default)]
    pub input_checksum: Option<String>,
    /// Remote handle of the output file
    #[serde(default)]
    pub output_artifact_ref: Option<String>,
    /// Remote handle of the error file
    #[serde(default)]
    pub error_artifact_ref: Option<String>,
    /// Batch-level errors reported by the remote service, verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remote_errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Results durably handed to the result store
    #[serde(default)]
    pub collected: bool,
    /// Outcome of the collection that set `collected`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionReport>,
}

impl BatchJob {
    /// Record persisted before the remote submission is attempted
    pub fn provisional(
        job_id: impl Into<String>,
        provider: impl Into<String>,
        processor_type: impl Into<String>,
        scope: JobScope,
        model: impl Into<String>,
        item_count: u64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            provider_batch_id: None,
            provider: provider.into(),
            processor_type: processor_type.into(),
            scope,
            model: model.into(),
            status: BatchStatus::Pending,
            item_count,
            completed_count: 0,
            failed_count: 0,
            input_artifact_ref: None,
            input_checksum: None,
            output_artifact_ref: None,
            error_artifact_ref: None,
            remote_errors: Vec::new(),
            created_at: Utc::now(),
            last_polled_at: None,
            collected: false,
            collection: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Non-terminal record whose submission was never confirmed
    pub fn is_orphaned(&self) -> bool {
        self.provider_batch_id.is_none() && !self.status.is_terminal()
    }

    /// Result artifacts available for collection, output first
    pub fn result_artifacts(&self) -> Vec<(ArtifactKind, String)> {
        let mut artifacts = Vec::with_capacity(2);
        if let Some(output) = &self.output_artifact_ref {
            artifacts.push((ArtifactKind::Output, output.clone()));
        }
        if let Some(error) = &self.error_artifact_ref {
            artifacts.push((ArtifactKind::Error, error.clone()));
        }
        artifacts
    }
}

/// Key naming a result line that could not be decoded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum DecodeFailureKey {
    /// The line's `custom_id` was readable
    CustomId(String),
    /// Zero-based line index; the `custom_id` itself was unusable
    LineIndex(usize),
}

impl fmt::Display for DecodeFailureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFailureKey::CustomId(id) => write!(f, "custom_id {}", id),
            DecodeFailureKey::LineIndex(index) => write!(f, "line {}", index + 1),
        }
    }
}

/// A malformed result line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodeFailure {
    pub key: DecodeFailureKey,
    pub artifact: ArtifactKind,
    pub reason: String,
}

/// A well-formed result line reporting a per-item failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemError {
    pub item: ItemRef,
    #[serde(default)]
    pub status_code: Option<u16>,
    pub code: String,
    pub message: String,
}

/// What a collection produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionReport {
    pub job_id: String,
    /// Items whose results were handed to the result store
    pub dispatched: Vec<ItemRef>,
    /// Items the remote service reported as failed
    #[serde(default)]
    pub item_errors: Vec<ItemError>,
    /// Lines that could not be decoded
    #[serde(default)]
    pub decode_failures: Vec<DecodeFailure>,
    pub collected_at: DateTime<Utc>,
}

impl CollectionReport {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            dispatched: Vec::new(),
            item_errors: Vec::new(),
            decode_failures: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    /// Fail when any line could not be decoded
    pub fn ensure_complete(&self) -> crate::utils::error::Result<()> {
        if self.decode_failures.is_empty() {
            return Ok(());
        }
        let keys = self
            .decode_failures
            .iter()
            .map(|failure| failure.key.to_string())
            .collect::<Vec<_>>();
        Err(crate::utils::error::BatchError::PartialDecodeFailure {
            job_id: self.job_id.clone(),
            count: keys.len(),
            keys,
        })
    }
}

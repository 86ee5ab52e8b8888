//! Job Registry
//!
//! Durable store of [`BatchJob`] records keyed by job id. Writes are atomic
//! per record; `lock` serializes read-modify-write cycles on a single job
//! while `list` stays a lock-free snapshot read.

mod file;
mod lock;
mod memory;

pub use file::FileJobRegistry;
pub use lock::{JobLock, RecordLocks};
pub use memory::InMemoryJobRegistry;

use async_trait::async_trait;

use crate::core::batch::{BatchJob, BatchStatus};
use crate::utils::error::{BatchError, Result};

/// Longest accepted job id
pub const MAX_JOB_ID_LEN: usize = 128;

/// Selection for `list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<BatchStatus>,
    pub organization: Option<String>,
    pub repository: Option<String>,
    /// Only non-terminal records that never received a remote id
    pub orphaned_only: bool,
}

impl JobFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: BatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn orphaned(mut self) -> Self {
        self.orphaned_only = true;
        self
    }

    pub fn matches(&self, job: &BatchJob) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(organization) = &self.organization {
            if &job.scope.organization != organization {
                return false;
            }
        }
        if let Some(repository) = &self.repository {
            if job.scope.repository.as_ref() != Some(repository) {
                return false;
            }
        }
        !self.orphaned_only || job.is_orphaned()
    }
}

/// Reject ids that could escape the registry directory
pub fn validate_job_id(job_id: &str) -> Result<()> {
    if job_id.is_empty() || job_id.len() > MAX_JOB_ID_LEN {
        return Err(BatchError::Validation(format!(
            "job id must be 1-{} characters",
            MAX_JOB_ID_LEN
        )));
    }
    if !job_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(BatchError::Validation(format!(
            "job id {:?} may only contain ASCII letters, digits, '-' and '_'",
            job_id
        )));
    }
    Ok(())
}

/// Sort order of `list` results
pub(crate) fn sort_jobs(jobs: &mut [BatchJob]) {
    jobs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });
}

/// Durable store of job records
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Insert a new record; `Conflict` if the id is taken
    async fn create(&self, job: &BatchJob) -> Result<()>;

    async fn get(&self, job_id: &str) -> Result<Option<BatchJob>>;

    /// Replace an existing record; `NotFound` if there is none
    async fn update(&self, job: &BatchJob) -> Result<()>;

    /// Delete a record, returning whether one existed
    async fn delete(&self, job_id: &str) -> Result<bool>;

    /// Snapshot of matching records, oldest first
    async fn list(&self, filter: &JobFilter) -> Result<Vec<BatchJob>>;

    /// Exclusive access to one record until the guard drops
    async fn lock(&self, job_id: &str) -> Result<JobLock>;

    /// Like `get`, but a missing record is `NotFound`
    async fn require(&self, job_id: &str) -> Result<BatchJob> {
        self.get(job_id)
            .await?
            .ok_or_else(|| BatchError::NotFound(format!("batch job {}", job_id)))
    }
}

//! File-backed job registry
//!
//! One pretty-printed JSON record per job at `{data_dir}/jobs/{job_id}.json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::lock::{JobLock, RecordLocks, acquire_lock_file};
use super::{JobFilter, JobRegistry, sort_jobs, validate_job_id};
use crate::core::batch::BatchJob;
use crate::storage::files::write_atomic;
use crate::utils::error::{BatchError, Result};

/// Directory below the data dir holding job records
pub const JOBS_DIR: &str = "jobs";

#[derive(Debug)]
pub struct FileJobRegistry {
    jobs_dir: PathBuf,
    locks: RecordLocks,
    lock_wait: Duration,
}

impl FileJobRegistry {
    pub async fn new(data_dir: impl AsRef<Path>, lock_wait: Duration) -> Result<Self> {
        let jobs_dir = data_dir.as_ref().join(JOBS_DIR);
        fs::create_dir_all(&jobs_dir).await.map_err(|e| {
            BatchError::Registry(format!(
                "Failed to create registry directory {}: {}",
                jobs_dir.display(),
                e
            ))
        })?;
        info!("Job registry initialized at: {}", jobs_dir.display());
        Ok(Self {
            jobs_dir,
            locks: RecordLocks::new(),
            lock_wait,
        })
    }

    #[cfg(test)]
    pub(crate) fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    fn record_path(&self, job_id: &str) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        Ok(self.jobs_dir.join(format!("{}.json", job_id)))
    }

    fn lock_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{}.lock", job_id))
    }

    async fn read_record(path: &Path) -> Result<Option<BatchJob>> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BatchError::Registry(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let job = serde_json::from_slice(&content).map_err(|e| {
            BatchError::Registry(format!("Corrupt job record {}: {}", path.display(), e))
        })?;
        Ok(Some(job))
    }
}

#[async_trait]
impl JobRegistry for FileJobRegistry {
    async fn create(&self, job: &BatchJob) -> Result<()> {
        let path = self.record_path(&job.job_id)?;
        let content = serde_json::to_vec_pretty(job)?;

        // Write fully, then hard-link into place: linking fails if the
        // target exists, so a record is never created twice or half-written.
        let temp_path = self.jobs_dir.join(format!(".{}.tmp", Uuid::new_v4()));
        write_atomic(&temp_path, &content).await?;
        let linked = fs::hard_link(&temp_path, &path).await;
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(path = %temp_path.display(), "Failed to remove temp record: {}", e);
        }

        match linked {
            Ok(()) => {
                debug!(job_id = %job.job_id, "Created job record");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(BatchError::Conflict(
                format!("batch job {} already exists", job.job_id),
            )),
            Err(e) => Err(BatchError::Registry(format!(
                "Failed to create {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn get(&self, job_id: &str) -> Result<Option<BatchJob>> {
        let path = self.record_path(job_id)?;
        Self::read_record(&path).await
    }

    async fn update(&self, job: &BatchJob) -> Result<()> {
        let path = self.record_path(&job.job_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(BatchError::NotFound(format!("batch job {}", job.job_id)));
        }
        let content = serde_json::to_vec_pretty(job)?;
        write_atomic(&path, &content).await?;
        debug!(job_id = %job.job_id, status = %job.status, "Updated job record");
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        let path = self.record_path(job_id)?;
        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(BatchError::Registry(format!(
                    "Failed to delete {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        self.locks.forget(job_id);
        Ok(removed)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<BatchJob>> {
        let mut entries = fs::read_dir(&self.jobs_dir).await.map_err(|e| {
            BatchError::Registry(format!(
                "Failed to list {}: {}",
                self.jobs_dir.display(),
                e
            ))
        })?;

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(job)) if filter.matches(&job) => jobs.push(job),
                Ok(_) => {}
                // A record deleted or corrupted mid-listing must not hide the rest
                Err(e) => warn!("Skipping unreadable job record: {}", e),
            }
        }
        sort_jobs(&mut jobs);
        Ok(jobs)
    }

    async fn lock(&self, job_id: &str) -> Result<JobLock> {
        validate_job_id(job_id)?;
        let guard = self.locks.acquire(job_id).await;
        let lock_path = self.lock_path(job_id);
        let lock_file = acquire_lock_file(&lock_path, self.lock_wait).await?;
        Ok(JobLock::new(job_id, guard, Some(lock_file)))
    }
}

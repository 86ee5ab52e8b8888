//! In-memory job registry

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::lock::{JobLock, RecordLocks};
use super::{JobFilter, JobRegistry, sort_jobs, validate_job_id};
use crate::core::batch::BatchJob;
use crate::utils::error::{BatchError, Result};

/// `DashMap`-backed registry with the same contract as the file registry
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: DashMap<String, BatchJob>,
    locks: RecordLocks,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn create(&self, job: &BatchJob) -> Result<()> {
        validate_job_id(&job.job_id)?;
        match self.jobs.entry(job.job_id.clone()) {
            Entry::Occupied(_) => Err(BatchError::Conflict(format!(
                "batch job {} already exists",
                job.job_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, job_id: &str) -> Result<Option<BatchJob>> {
        Ok(self.jobs.get(job_id).map(|job| job.clone()))
    }

    async fn update(&self, job: &BatchJob) -> Result<()> {
        match self.jobs.get_mut(&job.job_id) {
            Some(mut existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(BatchError::NotFound(format!("batch job {}", job.job_id))),
        }
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        let removed = self.jobs.remove(job_id).is_some();
        self.locks.forget(job_id);
        Ok(removed)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<BatchJob>> {
        let mut jobs: Vec<BatchJob> = self
            .jobs
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_jobs(&mut jobs);
        Ok(jobs)
    }

    async fn lock(&self, job_id: &str) -> Result<JobLock> {
        validate_job_id(job_id)?;
        let guard = self.locks.acquire(job_id).await;
        Ok(JobLock::new(job_id, guard, None))
    }
}

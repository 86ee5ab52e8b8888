//! Batch Job Manager
//!
//! Drives every job through its lifecycle. The manager is the only writer of
//! job records; each mutating operation runs under the registry's per-record
//! lock and persists at the end, so a failed call leaves the stored record
//! as it was.

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::codec::{RequestCodec, artifact_lines};
use super::dispatcher::ResultDispatcher;
use super::types::{BatchJob, BatchStatus, CollectionReport, JobScope, ModelConfig};
use crate::core::providers::{BatchProvider, RemoteBatch, SubmitRequest};
use crate::core::traits::{ItemSource, ResultStore};
use crate::storage::files::ArtifactCache;
use crate::storage::registry::{JobFilter, JobRegistry};
use crate::utils::error::{BatchError, Result};

/// Orchestrates create, status, collect, cancel and remove
#[derive(Clone)]
pub struct BatchJobManager {
    registry: Arc<dyn JobRegistry>,
    provider: Arc<dyn BatchProvider>,
    items: Arc<dyn ItemSource>,
    dispatcher: ResultDispatcher,
    artifacts: ArtifactCache,
    codec: RequestCodec,
}

impl BatchJobManager {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        provider: Arc<dyn BatchProvider>,
        items: Arc<dyn ItemSource>,
        results: Arc<dyn ResultStore>,
        artifacts: ArtifactCache,
        codec: RequestCodec,
    ) -> Self {
        Self {
            registry,
            provider,
            items,
            dispatcher: ResultDispatcher::new(results),
            artifacts,
            codec,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Select items, encode them, submit the batch and record the job
    ///
    /// A provisional record is persisted before the remote call. If the
    /// submission fails the record and its cached request file are removed
    /// again; if the final update fails the record stays behind as an orphan.
    #[instrument(skip(self, scope, model), fields(scope = %scope))]
    pub async fn create_batch_job(
        &self,
        processor_type: &str,
        scope: &JobScope,
        model: &ModelConfig,
    ) -> Result<BatchJob> {
        validate_request(processor_type, scope, model)?;

        let items = self.items.resolve(scope).await?;
        if items.is_empty() {
            return Err(BatchError::EmptySelection {
                scope: scope.to_string(),
            });
        }
        let encoded = self.codec.encode(&items, model)?;

        let job_id = new_job_id();
        let input_path = self.artifacts.store_input(&job_id, &encoded.content).await?;

        let mut job = BatchJob::provisional(
            job_id.clone(),
            self.provider.name(),
            processor_type,
            scope.clone(),
            model.model.clone(),
            encoded.item_count,
        );
        job.input_artifact_ref = Some(input_path.display().to_string());
        job.input_checksum = Some(encoded.checksum.clone());

        if let Err(e) = self.registry.create(&job).await {
            self.discard_artifacts(&job_id).await;
            return Err(e);
        }
        let _lock = match self.registry.lock(&job_id).await {
            Ok(lock) => lock,
            Err(e) => {
                self.discard(&job_id).await;
                return Err(e);
            }
        };

        let request = SubmitRequest {
            job_id: job_id.clone(),
            content: encoded.content,
            filename: format!("{}.jsonl", job_id),
            endpoint: model.endpoint.clone(),
            item_count: encoded.item_count,
        };
        let submitted = match self.provider.submit(&request).await {
            Ok(submitted) => submitted,
            Err(e) => {
                warn!(job_id = %job_id, "Submission failed, discarding provisional record: {}", e);
                self.discard(&job_id).await;
                return Err(BatchError::from_provider(job_id, e));
            }
        };

        job.provider_batch_id = Some(submitted.provider_batch_id.clone());
        if let Err(e) = self.registry.update(&job).await {
            error!(
                job_id = %job_id,
                provider_batch_id = %submitted.provider_batch_id,
                "Remote batch created but the job record could not be updated; the record is orphaned: {}",
                e
            );
            return Err(e);
        }

        info!(
            job_id = %job_id,
            provider_batch_id = %submitted.provider_batch_id,
            items = job.item_count,
            "Submitted batch job"
        );
        Ok(job)
    }

    /// Reconcile a job with the remote service
    ///
    /// Terminal jobs are returned as stored without a remote call.
    #[instrument(skip(self))]
    pub async fn check_job_status(&self, job_id: &str) -> Result<BatchJob> {
        let _lock = self.registry.lock(job_id).await?;
        let job = self.registry.require(job_id).await?;
        if job.is_terminal() {
            return Ok(job);
        }
        let provider_batch_id = remote_id(&job, "check")?;

        let remote = self
            .provider
            .get_status(provider_batch_id)
            .await
            .map_err(|e| BatchError::from_provider(job_id, e))?;

        let mut updated = job.clone();
        reconcile(&mut updated, &remote);
        updated.last_polled_at = Some(Utc::now());
        self.registry.update(&updated).await?;
        Ok(updated)
    }

    /// Download, decode and dispatch the results of a finished job
    ///
    /// Repeat calls return the stored report without touching the provider.
    /// Undecodable lines are listed on the report instead of failing the call.
    #[instrument(skip(self))]
    pub async fn collect_results(&self, job_id: &str) -> Result<CollectionReport> {
        let _lock = self.registry.lock(job_id).await?;
        let job = self.registry.require(job_id).await?;

        if job.collected {
            debug!(job_id, "Results already collected");
            return Ok(job
                .collection
                .clone()
                .unwrap_or_else(|| CollectionReport::new(job_id)));
        }
        if !matches!(job.status, BatchStatus::Completed | BatchStatus::Failed) {
            return Err(BatchError::invalid_state(
                job_id,
                job.status,
                "collect",
                "results are only available once the job has completed or failed",
            ));
        }
        let artifacts = job.result_artifacts();
        if artifacts.is_empty() {
            return Err(BatchError::invalid_state(
                job_id,
                job.status,
                "collect",
                "the remote service reported no output or error artifact",
            ));
        }
        let provider_batch_id = remote_id(&job, "collect")?;

        let mut report = CollectionReport::new(job_id);
        for (kind, reference) in artifacts {
            let stream = self
                .provider
                .fetch_artifact(provider_batch_id, kind, &reference)
                .await
                .map_err(|e| BatchError::from_provider(job_id, e))?;
            let mut lines = Box::pin(artifact_lines(stream));

            while let Some(next) = lines.next().await {
                let (index, line) = next.map_err(|e| BatchError::from_provider(job_id, e))?;
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match self.codec.decode_line(index, &line, kind) {
                    Ok(decoded) => {
                        self.dispatcher
                            .dispatch(&job, kind, decoded, &mut report)
                            .await?
                    }
                    Err(failure) => {
                        debug!(
                            job_id,
                            artifact = %kind,
                            key = %failure.key,
                            reason = %failure.reason,
                            "Undecodable result line"
                        );
                        report.decode_failures.push(failure);
                    }
                }
            }
        }
        report.collected_at = Utc::now();

        let mut updated = job.clone();
        updated.collected = true;
        updated.collection = Some(report.clone());
        self.registry.update(&updated).await?;

        if !report.decode_failures.is_empty() {
            warn!(
                job_id,
                count = report.decode_failures.len(),
                "Collection finished with undecodable result lines"
            );
        }
        info!(
            job_id,
            dispatched = report.dispatched.len(),
            item_errors = report.item_errors.len(),
            "Collected batch results"
        );
        Ok(report)
    }

    /// Cancel a live job
    ///
    /// If the remote batch finished before the cancellation landed, its
    /// terminal status is adopted instead of `cancelled`.
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: &str) -> Result<BatchJob> {
        let _lock = self.registry.lock(job_id).await?;
        let job = self.registry.require(job_id).await?;
        if job.is_terminal() {
            return Err(BatchError::invalid_state(
                job_id,
                job.status,
                "cancel",
                "the job already reached a terminal status",
            ));
        }

        let mut updated = job.clone();
        match job.provider_batch_id.as_deref() {
            None => {
                warn!(job_id, "Cancelling orphaned job locally; no remote batch was recorded");
            }
            Some(provider_batch_id) => {
                let remote = self.request_cancel(job_id, provider_batch_id).await?;
                reconcile(&mut updated, &remote);
                updated.last_polled_at = Some(Utc::now());
            }
        }
        if !updated.is_terminal() {
            updated.status = BatchStatus::Cancelled;
        }

        self.registry.update(&updated).await?;
        info!(job_id, status = %updated.status, "Cancel request handled");
        Ok(updated)
    }

    async fn request_cancel(&self, job_id: &str, provider_batch_id: &str) -> Result<RemoteBatch> {
        let cancel_error = match self.provider.cancel(provider_batch_id).await {
            Ok(remote) => return Ok(remote),
            Err(e) if e.is_transient() => return Err(BatchError::from_provider(job_id, e)),
            Err(e) => e,
        };

        // A refusal often means the batch finished first; check before failing
        match self.provider.get_status(provider_batch_id).await {
            Ok(remote) if remote_is_terminal(&remote) => {
                info!(
                    job_id,
                    remote_status = %remote.status,
                    "Remote batch already finished; adopting its status"
                );
                Ok(remote)
            }
            _ => Err(BatchError::from_provider(job_id, cancel_error)),
        }
    }

    /// Delete a job record and its cached artifacts
    ///
    /// Live jobs need `force`; the remote batch is not cancelled.
    #[instrument(skip(self))]
    pub async fn remove_job(&self, job_id: &str, force: bool) -> Result<BatchJob> {
        let _lock = self.registry.lock(job_id).await?;
        let job = self.registry.require(job_id).await?;

        if !job.is_terminal() {
            if !force {
                return Err(BatchError::RequiresConfirmation {
                    job_id: job_id.to_string(),
                    status: job.status,
                });
            }
            warn!(
                job_id,
                status = %job.status,
                provider_batch_id = job.provider_batch_id.as_deref().unwrap_or("-"),
                "Removing a live job; the remote batch may still be running"
            );
        }

        self.registry.delete(job_id).await?;
        self.discard_artifacts(job_id).await;
        info!(job_id, "Removed batch job");
        Ok(job)
    }

    /// Registry snapshot; no remote calls
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<BatchJob>> {
        self.registry.list(filter).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<BatchJob> {
        self.registry.require(job_id).await
    }

    async fn discard(&self, job_id: &str) {
        if let Err(e) = self.registry.delete(job_id).await {
            warn!(job_id, "Failed to delete provisional record: {}", e);
        }
        self.discard_artifacts(job_id).await;
    }

    async fn discard_artifacts(&self, job_id: &str) {
        if let Err(e) = self.artifacts.remove_job(job_id).await {
            warn!(job_id, "Failed to remove cached artifacts: {}", e);
        }
    }
}

fn new_job_id() -> String {
    format!("batch_{}", Uuid::new_v4().simple())
}

fn validate_request(processor_type: &str, scope: &JobScope, model: &ModelConfig) -> Result<()> {
    if processor_type.trim().is_empty() {
        return Err(BatchError::Validation("processor type is required".to_string()));
    }
    if scope.organization.is_empty() {
        return Err(BatchError::Validation("scope organization is required".to_string()));
    }
    if scope.item_number.is_some() && scope.repository.is_none() {
        return Err(BatchError::Validation(
            "a single-item scope needs a repository".to_string(),
        ));
    }
    if model.model.trim().is_empty() {
        return Err(BatchError::Validation("model is required".to_string()));
    }
    Ok(())
}

fn remote_id<'a>(job: &'a BatchJob, operation: &'static str) -> Result<&'a str> {
    job.provider_batch_id.as_deref().ok_or_else(|| {
        BatchError::invalid_state(
            job.job_id.clone(),
            job.status,
            operation,
            "the submission was never confirmed (orphaned record)",
        )
    })
}

fn remote_is_terminal(remote: &RemoteBatch) -> bool {
    remote
        .status
        .to_local()
        .map(|status| status.is_terminal())
        .unwrap_or(false)
}

/// Fold a remote snapshot into a job record
///
/// Status only moves forward and counters never decrease; anything else the
/// remote reports is logged as a consistency fault and ignored.
pub(crate) fn reconcile(job: &mut BatchJob, remote: &RemoteBatch) {
    match remote.status.to_local() {
        Some(next) if next == job.status => {}
        Some(next) if job.status.can_transition_to(next) => {
            info!(job_id = %job.job_id, from = %job.status, to = %next, "Job status changed");
            job.status = next;
        }
        Some(next) => {
            warn!(
                job_id = %job.job_id,
                current = %job.status,
                reported = %next,
                "Ignoring backward status transition reported by remote"
            );
        }
        None => {
            warn!(job_id = %job.job_id, remote_status = %remote.status, "Unrecognized remote status");
        }
    }

    advance_counter(&job.job_id, "completed", &mut job.completed_count, remote.counts.completed);
    advance_counter(&job.job_id, "failed", &mut job.failed_count, remote.counts.failed);

    if let Some(output) = &remote.output_file_id {
        job.output_artifact_ref = Some(output.clone());
    }
    if let Some(errors) = &remote.error_file_id {
        job.error_artifact_ref = Some(errors.clone());
    }
    if !remote.errors.is_empty() {
        job.remote_errors = remote.errors.clone();
    }
}

fn advance_counter(job_id: &str, counter: &'static str, current: &mut u64, reported: u64) {
    if reported < *current {
        warn!(
            job_id,
            counter,
            current = *current,
            reported,
            "Remote counter regressed; keeping the previous value"
        );
        return;
    }
    *current = reported;
}

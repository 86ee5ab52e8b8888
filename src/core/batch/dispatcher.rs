//! Result Dispatcher
//!
//! Routes decoded result lines to the result store and records the outcome
//! of each line on the collection report.

use std::sync::Arc;
use tracing::debug;

use super::codec::DecodedLine;
use super::custom_id;
use super::types::{ArtifactKind, BatchJob, CollectionReport, DecodeFailure, DecodeFailureKey};
use crate::core::traits::ResultStore;
use crate::utils::error::Result;

#[derive(Clone)]
pub struct ResultDispatcher {
    store: Arc<dyn ResultStore>,
}

impl ResultDispatcher {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Hand one decoded line over
    ///
    /// A store failure is returned as-is so the whole collection can be
    /// retried; nothing about the job is persisted here.
    pub async fn dispatch(
        &self,
        job: &BatchJob,
        artifact: ArtifactKind,
        line: DecodedLine,
        report: &mut CollectionReport,
    ) -> Result<()> {
        if !job.scope.contains(line.item()) {
            let item = line.item();
            let id = custom_id::encode(item).unwrap_or_else(|_| item.to_string());
            debug!(job_id = %job.job_id, custom_id = %id, "Result line outside job scope");
            report.decode_failures.push(DecodeFailure {
                key: DecodeFailureKey::CustomId(id),
                artifact,
                reason: format!("item {} is outside job scope {}", item, job.scope),
            });
            return Ok(());
        }

        match line {
            DecodedLine::Success { item, body } => {
                self.store.store(&job.processor_type, &item, &body).await?;
                report.dispatched.push(item);
            }
            DecodedLine::Failure(error) => {
                debug!(
                    job_id = %job.job_id,
                    item = %error.item,
                    code = %error.code,
                    "Remote service reported item failure"
                );
                report.item_errors.push(error);
            }
        }
        Ok(())
    }
}

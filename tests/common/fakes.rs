//! Scripted collaborators for manager tests
//!
//! `FakeProvider` answers from a script and counts every call so tests can
//! assert that an operation did or did not reach the remote service.
//! `FailingUpdates` wraps a registry and fails its next `update`.

use async_trait::async_trait;
use bytes::Bytes;
use litellm_batch::core::batch::{
    ArtifactKind, BatchJob, ItemRef, JobScope, WorkItem, custom_id,
};
use litellm_batch::core::providers::{
    ArtifactStream, BatchProvider, ProviderError, RemoteBatch, RemoteStatus, RequestCounts,
    SubmitRequest, SubmittedBatch,
};
use litellm_batch::core::traits::{ItemSource, ResultStore};
use litellm_batch::storage::{JobFilter, JobLock, JobRegistry};
use litellm_batch::utils::error::{BatchError, Result};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const FAKE_PROVIDER: &str = "fake";

/// Number of calls per adapter operation
#[derive(Debug, Default)]
pub struct CallCounts {
    pub submit: AtomicUsize,
    pub get_status: AtomicUsize,
    pub fetch_artifact: AtomicUsize,
    pub cancel: AtomicUsize,
}

#[derive(Default)]
struct Script {
    next_batch: usize,
    submit_error: Option<ProviderError>,
    statuses: VecDeque<std::result::Result<RemoteBatch, ProviderError>>,
    cancel: Option<std::result::Result<RemoteBatch, ProviderError>>,
    artifacts: HashMap<String, Vec<Bytes>>,
    submitted: Vec<SubmitRequest>,
}

#[derive(Default)]
pub struct FakeProvider {
    script: Mutex<Script>,
    pub calls: CallCounts,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next submission fail
    pub fn fail_submit(&self, error: ProviderError) {
        self.script.lock().unwrap().submit_error = Some(error);
    }

    /// Queue the answer of the next `get_status` call
    pub fn push_status(&self, remote: RemoteBatch) {
        self.script.lock().unwrap().statuses.push_back(Ok(remote));
    }

    pub fn push_status_error(&self, error: ProviderError) {
        self.script.lock().unwrap().statuses.push_back(Err(error));
    }

    pub fn set_cancel(&self, result: std::result::Result<RemoteBatch, ProviderError>) {
        self.script.lock().unwrap().cancel = Some(result);
    }

    /// Serve an artifact as the given chunks
    pub fn put_artifact(&self, file_id: &str, chunks: Vec<Bytes>) {
        self.script
            .lock()
            .unwrap()
            .artifacts
            .insert(file_id.to_string(), chunks);
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.script.lock().unwrap().submitted.clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchProvider for FakeProvider {
    fn name(&self) -> &'static str {
        FAKE_PROVIDER
    }

    async fn submit(
        &self,
        request: &SubmitRequest,
    ) -> std::result::Result<SubmittedBatch, ProviderError> {
        self.calls.submit.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.submit_error.take() {
            return Err(error);
        }
        script.next_batch += 1;
        script.submitted.push(request.clone());
        let id = format!("batch_remote_{}", script.next_batch);
        Ok(SubmittedBatch {
            provider_batch_id: id.clone(),
            input_file_id: Some(format!("file-input-{}", script.next_batch)),
            remote: RemoteBatch::new(id, RemoteStatus::Validating),
        })
    }

    async fn get_status(
        &self,
        provider_batch_id: &str,
    ) -> std::result::Result<RemoteBatch, ProviderError> {
        self.calls.get_status.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .statuses
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::api_error(FAKE_PROVIDER, 404, provider_batch_id)))
    }

    async fn fetch_artifact(
        &self,
        _provider_batch_id: &str,
        _kind: ArtifactKind,
        reference: &str,
    ) -> std::result::Result<ArtifactStream, ProviderError> {
        self.calls.fetch_artifact.fetch_add(1, Ordering::SeqCst);
        let chunks = self
            .script
            .lock()
            .unwrap()
            .artifacts
            .get(reference)
            .cloned()
            .ok_or_else(|| ProviderError::api_error(FAKE_PROVIDER, 404, reference))?;
        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok::<_, ProviderError>),
        )))
    }

    async fn cancel(
        &self,
        provider_batch_id: &str,
    ) -> std::result::Result<RemoteBatch, ProviderError> {
        self.calls.cancel.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .cancel
            .take()
            .unwrap_or_else(|| Ok(RemoteBatch::new(provider_batch_id, RemoteStatus::Cancelling)))
    }
}

/// Remote snapshot with counters
pub fn remote(id: &str, status: RemoteStatus, completed: u64, failed: u64) -> RemoteBatch {
    let mut batch = RemoteBatch::new(id, status);
    batch.counts = RequestCounts {
        total: completed + failed,
        completed,
        failed,
    };
    batch
}

/// Completed remote batch pointing at an output file
pub fn completed(id: &str, completed: u64, output_file_id: &str) -> RemoteBatch {
    let mut batch = remote(id, RemoteStatus::Completed, completed, 0);
    batch.output_file_id = Some(output_file_id.to_string());
    batch
}

/// One well-formed success line
pub fn success_line(item: &ItemRef, content: &str) -> String {
    json!({
        "id": format!("batch_req_{}", item.number),
        "custom_id": custom_id::encode(item).unwrap(),
        "response": {
            "status_code": 200,
            "request_id": "req_1",
            "body": {"choices": [{"message": {"role": "assistant", "content": content}}]}
        },
        "error": null
    })
    .to_string()
}

/// In-memory item source and result store
#[derive(Default)]
pub struct MemoryItems {
    items: Mutex<Vec<WorkItem>>,
    results: Mutex<HashMap<(String, ItemRef), Value>>,
    pub stores: AtomicUsize,
}

impl MemoryItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` items numbered from 1 in one repository
    pub fn with_items(organization: &str, repository: &str, count: u64) -> Self {
        let store = Self::new();
        for number in 1..=count {
            store.add(ItemRef::new(organization, repository, number));
        }
        store
    }

    pub fn add(&self, item: ItemRef) {
        let payload = json!({
            "messages": [{"role": "user", "content": format!("Summarize {}", item)}]
        });
        self.items.lock().unwrap().push(WorkItem::new(item, payload));
    }

    pub fn result(&self, processor_type: &str, item: &ItemRef) -> Option<Value> {
        self.results
            .lock()
            .unwrap()
            .get(&(processor_type.to_string(), item.clone()))
            .cloned()
    }

    pub fn result_count(&self) -> usize {
        self.results.lock().unwrap().len()
    }
}

#[async_trait]
impl ItemSource for MemoryItems {
    async fn resolve(&self, scope: &JobScope) -> Result<Vec<WorkItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|work| scope.contains(&work.item))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultStore for MemoryItems {
    async fn store(&self, processor_type: &str, item: &ItemRef, result: &Value) -> Result<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .insert((processor_type.to_string(), item.clone()), result.clone());
        Ok(())
    }
}

/// Registry whose next `update` fails, as if the disk filled up mid-submit
pub struct FailingUpdates<R> {
    inner: R,
    fail_next: AtomicBool,
}

impl<R: JobRegistry> FailingUpdates<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn fail_next_update(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<R: JobRegistry> JobRegistry for FailingUpdates<R> {
    async fn create(&self, job: &BatchJob) -> Result<()> {
        self.inner.create(job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<BatchJob>> {
        self.inner.get(job_id).await
    }

    async fn update(&self, job: &BatchJob) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BatchError::Registry("No space left on device".to_string()));
        }
        self.inner.update(job).await
    }

    async fn delete(&self, job_id: &str) -> Result<bool> {
        self.inner.delete(job_id).await
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<BatchJob>> {
        self.inner.list(filter).await
    }

    async fn lock(&self, job_id: &str) -> Result<JobLock> {
        self.inner.lock(job_id).await
    }
}

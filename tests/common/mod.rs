//! Common test utilities for litellm-batch
//!
//! This module provides shared test infrastructure for all tests:
//! - A scripted batch provider and in-memory item/result collaborators
//! - A harness wiring them to a file-backed registry in a temp directory
//! - Custom assertions
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::common::Harness;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let harness = Harness::with_items("acme", "widgets", 3).await;
//!     let job = harness.submit().await;
//!     // ...
//! }
//! ```

pub mod fakes;

pub use fakes::{FakeProvider, MemoryItems};

use litellm_batch::core::batch::{
    BatchJob, BatchJobManager, CodecLimits, JobScope, ModelConfig, RequestCodec,
};
use litellm_batch::storage::{ArtifactCache, FileJobRegistry, JobRegistry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const PROCESSOR: &str = "labels";

/// Assert a manager call failed with the given error variant
#[macro_export]
macro_rules! assert_batch_err {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Err(other) => panic!(
                "expected {}, got error: {}",
                stringify!($pattern),
                other
            ),
            Ok(value) => panic!("expected {}, got Ok({:?})", stringify!($pattern), value),
        }
    };
}

/// Manager over fakes and a file-backed registry
pub struct Harness {
    pub manager: BatchJobManager,
    pub provider: Arc<FakeProvider>,
    pub items: Arc<MemoryItems>,
    pub registry: Arc<FileJobRegistry>,
    pub artifacts: ArtifactCache,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new(items: MemoryItems) -> Self {
        Self::with_limits(items, CodecLimits::default()).await
    }

    pub async fn with_items(organization: &str, repository: &str, count: u64) -> Self {
        Self::new(MemoryItems::with_items(organization, repository, count)).await
    }

    pub async fn with_limits(items: MemoryItems, limits: CodecLimits) -> Self {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(
            FileJobRegistry::new(dir.path(), Duration::from_secs(30))
                .await
                .unwrap(),
        );
        let artifacts = ArtifactCache::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let provider = Arc::new(FakeProvider::new());
        let items = Arc::new(items);

        let manager = BatchJobManager::new(
            registry.clone(),
            provider.clone(),
            items.clone(),
            items.clone(),
            artifacts.clone(),
            RequestCodec::new(limits),
        );
        Self {
            manager,
            provider,
            items,
            registry,
            artifacts,
            dir,
        }
    }

    /// Submit a job over every item of `acme/widgets`
    pub async fn submit(&self) -> BatchJob {
        self.manager
            .create_batch_job(
                PROCESSOR,
                &JobScope::repository("acme", "widgets"),
                &ModelConfig::new("gpt-4o-mini"),
            )
            .await
            .unwrap()
    }

    /// Stored record, bypassing the manager
    pub async fn stored(&self, job_id: &str) -> Option<BatchJob> {
        self.registry.get(job_id).await.unwrap()
    }
}

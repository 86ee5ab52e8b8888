//! # LiteLLM Batch
//!
//! Lifecycle manager for asynchronous LLM batch APIs. Work items are packed
//! into a JSONL request file, submitted as one remote batch job, tracked in a
//! durable local registry and, once the remote service finishes, their
//! results are dispatched back to a result store.
//!
//! ## Features
//!
//! - **Two-phase submission**: a job is recorded before anything is sent, so
//!   a crash never leaves an unknown remote batch behind
//! - **Forward-only reconciliation**: remote status reports never move a job
//!   backwards and counters never regress
//! - **Idempotent collection**: results are fetched and dispatched once
//! - **OpenAI and Azure OpenAI** batch adapters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use litellm_batch::{Config, JobScope, build_manager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None).await?;
//!     let manager = build_manager(&config).await?;
//!
//!     let job = manager
//!         .create_batch_job(
//!             "labels",
//!             &JobScope::repository("rust-lang", "rust"),
//!             &config.model.to_model_config(),
//!         )
//!         .await?;
//!     println!("submitted {} ({} items)", job.job_id, job.item_count);
//!
//!     let job = manager.check_job_status(&job.job_id).await?;
//!     println!("status: {}", job.status);
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod storage;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use utils::error::{BatchError, Result};

pub use core::batch::{
    ArtifactKind, BatchJob, BatchJobManager, BatchStatus, CollectionReport, DecodeFailure,
    DecodeFailureKey, ItemError, ItemRef, JobScope, ModelConfig, RequestCodec, WorkItem,
    build_manager, provider_from_config,
};
pub use core::providers::{
    BatchProvider, OpenAIBatchProvider, ProviderError, RemoteBatch, RemoteStatus,
    RetryingProvider,
};
pub use core::traits::{ItemSource, ResultStore};
pub use storage::{ArtifactCache, FileJobRegistry, InMemoryJobRegistry, JobFilter, JobRegistry};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata captured by the build script
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version number
    pub version: &'static str,
    /// Seconds since the epoch at build time
    pub build_time: &'static str,
    /// Git commit hash
    pub git_hash: &'static str,
    /// Rust version
    pub rust_version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: VERSION,
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            rust_version: option_env!("RUST_VERSION").unwrap_or("unknown"),
        }
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (git {}, built {}, {})",
            NAME, self.version, self.git_hash, self.build_time, self.rust_version
        )
    }
}

/// Build
pub fn build_info() -> BuildInfo {
    BuildInfo::default()
}

//! Batch job lifecycle
//!
//! Submission of work items to an asynchronous batch service, status
//! reconciliation, result collection and cancellation.

pub mod builder;
pub mod codec;
pub mod custom_id;
mod dispatcher;
mod manager;
mod types;


// Re-export all public types
pub use builder::{build_manager, provider_from_config};
pub use codec::{
    CodecLimits, DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_ITEMS, DEFAULT_MAX_LINE_BYTES, DecodedLine,
    EncodedBatch, RequestCodec, artifact_lines,
};
pub use dispatcher::ResultDispatcher;
pub use manager::BatchJobManager;
pub use types::{
    ArtifactKind, BatchJob, BatchStatus, CollectionReport, DecodeFailure, DecodeFailureKey,
    ItemError, ItemRef, JobScope, ModelConfig, WorkItem,
};

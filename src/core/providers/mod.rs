//! Remote batch service adapters
//!
//! Every adapter implements [`BatchProvider`]; the manager never sees
//! service-specific wire formats.

pub mod base_provider;
pub mod openai;
pub mod retrying;
pub mod unified_provider;

pub use base_provider::{
    ArtifactStream, BatchProvider, RemoteBatch, RemoteStatus, RequestCounts, SubmitRequest,
    SubmittedBatch,
};
pub use openai::{OpenAIBatchConfig, OpenAIBatchProvider, ProviderAuth};
pub use retrying::RetryingProvider;
pub use unified_provider::ProviderError;

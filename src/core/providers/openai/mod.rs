//! OpenAI Batch Provider Module
//!
//! Batch adapter for the OpenAI Files + Batches APIs, also serving Azure OpenAI.

pub mod batches;
pub mod config;


pub use batches::OpenAIBatchProvider;
pub use config::{DEFAULT_API_BASE, OpenAIBatchConfig, ProviderAuth};

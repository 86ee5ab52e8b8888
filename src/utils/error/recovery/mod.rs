//! Error recovery utilities
//!
//! This module provides retry with exponential backoff for transient failures.

mod retry;
mod types;

pub use retry::{RetryPolicy, Retryable};
pub use types::RetryConfig;

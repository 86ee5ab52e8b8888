//! Error Handling utilities
//!
//! This module provides the error taxonomy and retry policy for remote calls.

pub mod error;
pub mod recovery;

// Re-export commonly used types
pub use error::*;
pub use recovery::{RetryConfig, RetryPolicy, Retryable};

//! Utility modules
//!
//! - **error**: error taxonomy and retry policy
//! - **logging**: tracing subscriber setup

pub mod error; // Error handling
pub mod logging; // Logging

pub use error::{BatchError, Result};

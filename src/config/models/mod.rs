//! Configuration data models
//!
//! This module defines all configuration structures used by the batch manager.

#![allow(missing_docs)]

pub mod batch;
pub mod monitoring;
pub mod provider;
pub mod storage;

// Re-export all configuration types
pub use batch::*;
pub use monitoring::*;
pub use provider::*;
pub use storage::*;

/// Default data directory
pub fn default_data_dir() -> String {
    "./batch-data".to_string()
}

/// Default wait for a job lock held elsewhere
pub fn default_lock_wait_secs() -> u64 {
    300
}

/// Default transport timeout in seconds
pub fn default_timeout() -> u64 {
    60
}

pub fn default_completion_window() -> String {
    "24h".to_string()
}

pub fn default_azure_api_version() -> String {
    "2024-10-21".to_string()
}

pub fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_endpoint() -> String {
    "/v1/chat/completions".to_string()
}

/// Default maximum retry attempts
pub fn default_max_retries() -> u32 {
    3
}

pub fn default_base_delay_ms() -> u64 {
    500
}

pub fn default_max_delay_ms() -> u64 {
    30_000
}

pub fn default_backoff_multiplier() -> f64 {
    2.0
}

pub fn default_true() -> bool {
    true
}

pub fn default_log_level() -> String {
    "info".to_string()
}

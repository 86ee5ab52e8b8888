//! Storage layer
//!
//! Job registry backends, the local artifact cache and the directory-backed
//! item source / result store.

/// Artifact cache and atomic file writes
pub mod files;
/// Local item source and result store
pub mod items;
/// Job registry backends
pub mod registry;

pub use files::{ArtifactCache, write_atomic};
pub use items::LocalItemStore;
pub use registry::{FileJobRegistry, InMemoryJobRegistry, JobFilter, JobLock, JobRegistry};

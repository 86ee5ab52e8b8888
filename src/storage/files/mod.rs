//! File storage implementation
//!
//! Local cache of per-job artifacts and the atomic write helper shared by the
//! file-backed stores.

mod local;

// Re-export public types
pub use local::{ArtifactCache, INPUT_FILE_NAME, write_atomic};

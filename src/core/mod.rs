//! Core functionality for the batch manager
//!
//! Job lifecycle, provider adapters and collaborator interfaces.

pub mod batch;
pub mod providers;
pub mod traits;

//! Core traits module
//!
//! Interfaces of the collaborators the batch manager depends on

pub mod item_source;
pub mod result_store;

pub use item_source::*;
pub use result_store::*;

//! Result storage collaborator trait

use async_trait::async_trait;
use serde_json::Value;

use crate::core::batch::ItemRef;
use crate::utils::error::Result;

/// Receives decoded results
///
/// `store` must overwrite: a re-run collection hands the same item over again.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store(&self, processor_type: &str, item: &ItemRef, result: &Value) -> Result<()>;
}

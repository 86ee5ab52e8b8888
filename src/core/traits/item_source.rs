//! Item source collaborator trait

use async_trait::async_trait;

use crate::core::batch::{JobScope, WorkItem};
use crate::utils::error::Result;

/// Resolves the work items a scope selects
///
/// Implementations are expected to return items in a stable order; an empty
/// result is not an error here, the manager turns it into `EmptySelection`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn resolve(&self, scope: &JobScope) -> Result<Vec<WorkItem>>;
}

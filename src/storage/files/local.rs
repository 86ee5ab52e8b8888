//! Local file system artifact cache

use crate::utils::error::{BatchError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// File name of the cached request file inside a job directory
pub const INPUT_FILE_NAME: &str = "input.jsonl";

/// Write `content` to `path` without ever exposing a partial file
///
/// The bytes go to a sibling temp file which is synced and then renamed over
/// the target.
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        BatchError::Storage(format!("Path has no parent directory: {}", path.display()))
    })?;
    fs::create_dir_all(parent).await.map_err(|e| {
        BatchError::Storage(format!("Failed to create directory {}: {}", parent.display(), e))
    })?;

    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(BatchError::Storage(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

/// Locally cached artifacts, one directory per job
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    base_path: PathBuf,
}

impl ArtifactCache {
    /// Create a new artifact cache rooted at `base_path`
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let path = base_path.into();

        fs::create_dir_all(&path).await.map_err(|e| {
            BatchError::Storage(format!("Failed to create artifact directory: {}", e))
        })?;

        info!("Artifact cache initialized at: {}", path.display());
        Ok(Self { base_path: path })
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.base_path.join(job_id)
    }

    /// Cache the request file submitted for a job
    pub async fn store_input(&self, job_id: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.job_dir(job_id).join(INPUT_FILE_NAME);
        write_atomic(&path, content).await?;
        debug!(job_id, bytes = content.len(), "Cached request file");
        Ok(path)
    }

    /// Delete every cached artifact of a job; missing directories are fine
    pub async fn remove_job(&self, job_id: &str) -> Result<()> {
        let dir = self.job_dir(job_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(job_id, "Removed cached artifacts");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BatchError::Storage(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}

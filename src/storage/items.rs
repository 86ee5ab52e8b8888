//! Local item source and result store
//!
//! Items live at `{data_dir}/items/{org}/{repo}/{number}.json`; results are
//! written to `{data_dir}/results/{processor_type}/{org}/{repo}/{number}.json`.
//! Path components are form-urlencoded so names cannot escape the tree.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::core::batch::{ItemRef, JobScope, WorkItem};
use crate::core::traits::{ItemSource, ResultStore};
use crate::storage::files::write_atomic;
use crate::utils::error::{BatchError, Result};

pub const ITEMS_DIR: &str = "items";
pub const RESULTS_DIR: &str = "results";

fn path_component(value: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    // `.` and `..` survive encoding unchanged
    match encoded.as_str() {
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => encoded,
    }
}

fn component_name(encoded: &str) -> String {
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_else(|| encoded.to_string())
}

/// Directory tree backed item source and result store
#[derive(Debug, Clone)]
pub struct LocalItemStore {
    items_dir: PathBuf,
    results_dir: PathBuf,
}

impl LocalItemStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            items_dir: data_dir.as_ref().join(ITEMS_DIR),
            results_dir: data_dir.as_ref().join(RESULTS_DIR),
        }
    }

    pub fn item_path(&self, item: &ItemRef) -> PathBuf {
        self.items_dir
            .join(path_component(&item.organization))
            .join(path_component(&item.repository))
            .join(format!("{}.json", item.number))
    }

    pub fn result_path(&self, processor_type: &str, item: &ItemRef) -> PathBuf {
        self.results_dir
            .join(path_component(processor_type))
            .join(path_component(&item.organization))
            .join(path_component(&item.repository))
            .join(format!("{}.json", item.number))
    }

    /// Save an item payload, replacing any previous version
    pub async fn put_item(&self, item: &ItemRef, payload: &Value) -> Result<()> {
        write_atomic(&self.item_path(item), &serde_json::to_vec_pretty(payload)?).await
    }

    /// Read back a stored result
    pub async fn get_result(&self, processor_type: &str, item: &ItemRef) -> Result<Option<Value>> {
        match fs::read(self.result_path(processor_type, item)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BatchError::Storage(format!(
                "Failed to read result for {}: {}",
                item, e
            ))),
        }
    }

    async fn read_item(&self, item: ItemRef, path: &Path) -> Result<WorkItem> {
        let content = fs::read(path).await.map_err(|e| {
            BatchError::Storage(format!("Failed to read item {}: {}", path.display(), e))
        })?;
        let payload = serde_json::from_slice(&content).map_err(|e| {
            BatchError::Storage(format!("Invalid item {}: {}", path.display(), e))
        })?;
        Ok(WorkItem::new(item, payload))
    }

    async fn repositories(&self, organization: &str) -> Result<Vec<String>> {
        let dir = self.items_dir.join(path_component(organization));
        let mut names = subdirectories(&dir).await?;
        names.sort();
        Ok(names.iter().map(|name| component_name(name)).collect())
    }

    async fn numbers(&self, organization: &str, repository: &str) -> Result<Vec<u64>> {
        let dir = self
            .items_dir
            .join(path_component(organization))
            .join(path_component(repository));
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BatchError::Storage(format!(
                    "Failed to list {}: {}",
                    dir.display(),
                    e
                )));
            }
        };

        let mut numbers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                Some(number) => numbers.push(number),
                None => warn!(path = %path.display(), "Ignoring item file without a numeric name"),
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }
}

async fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(BatchError::Storage(format!(
                "Failed to list {}: {}",
                dir.display(),
                e
            )));
        }
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

#[async_trait]
impl ItemSource for LocalItemStore {
    async fn resolve(&self, scope: &JobScope) -> Result<Vec<WorkItem>> {
        let repositories = match &scope.repository {
            Some(repository) => vec![repository.clone()],
            None => self.repositories(&scope.organization).await?,
        };

        let mut items = Vec::new();
        for repository in repositories {
            let numbers = match scope.item_number {
                Some(number) => vec![number],
                None => self.numbers(&scope.organization, &repository).await?,
            };
            for number in numbers {
                let item = ItemRef::new(scope.organization.clone(), repository.clone(), number);
                let path = self.item_path(&item);
                if !fs::try_exists(&path).await.unwrap_or(false) {
                    continue;
                }
                items.push(self.read_item(item, &path).await?);
            }
        }
        debug!(scope = %scope, count = items.len(), "Resolved work items");
        Ok(items)
    }
}

#[async_trait]
impl ResultStore for LocalItemStore {
    async fn store(&self, processor_type: &str, item: &ItemRef, result: &Value) -> Result<()> {
        let path = self.result_path(processor_type, item);
        write_atomic(&path, &serde_json::to_vec_pretty(result)?).await
    }
}

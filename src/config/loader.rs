//! Configuration loading utilities
//!
//! Environment variables override whatever the YAML file set.

use super::Config;
use super::models::*;
use crate::utils::error::{BatchError, Result};
use std::env;
use tracing::debug;

pub const ENV_DATA_DIR: &str = "BATCH_DATA_DIR";
pub const ENV_PROVIDER: &str = "BATCH_PROVIDER";
pub const ENV_LOG_LEVEL: &str = "BATCH_LOG_LEVEL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_API_BASE: &str = "OPENAI_API_BASE";
pub const ENV_AZURE_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_AZURE_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_AZURE_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    ///
    /// The provider kind is resolved first so credentials are only taken from
    /// the variables belonging to the selected service.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(data_dir) = var(ENV_DATA_DIR) {
            debug!("{} overrides data_dir", ENV_DATA_DIR);
            self.storage.data_dir = data_dir;
        }
        if let Some(kind) = var(ENV_PROVIDER) {
            self.provider.kind = kind
                .parse::<ProviderKind>()
                .map_err(|e| BatchError::Config(format!("Invalid {}: {}", ENV_PROVIDER, e)))?;
        }

        match self.provider.kind {
            ProviderKind::OpenAI => {
                if let Some(key) = var(ENV_OPENAI_API_KEY) {
                    self.provider.api_key = Some(key);
                }
                if let Some(base) = var(ENV_OPENAI_API_BASE) {
                    self.provider.api_base = Some(base);
                }
            }
            ProviderKind::Azure => {
                if let Some(key) = var(ENV_AZURE_API_KEY) {
                    self.provider.api_key = Some(key);
                }
                if let Some(endpoint) = var(ENV_AZURE_ENDPOINT) {
                    self.provider.api_base = Some(endpoint);
                }
                if let Some(version) = var(ENV_AZURE_API_VERSION) {
                    self.provider.api_version = version;
                }
            }
        }

        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }
}

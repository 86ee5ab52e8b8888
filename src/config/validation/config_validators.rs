//! Configuration section validators

use super::trait_def::Validate;
use crate::config::models::*;
use tracing::debug;

impl Validate for StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.data_dir.trim().is_empty() {
            return Err("data_dir cannot be empty".to_string());
        }
        if self.lock_wait_secs == 0 {
            return Err("lock_wait_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> Result<(), String> {
        debug!(kind = %self.kind, "Validating provider configuration");

        let has_key = self
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            return Err(format!("api_key is required for provider {}", self.kind));
        }

        match self.kind {
            ProviderKind::OpenAI => {}
            ProviderKind::Azure => {
                if !cfg!(feature = "azure") {
                    return Err("azure support is not compiled in".to_string());
                }
                if self.api_base.is_none() {
                    return Err("api_base (resource endpoint) is required for azure".to_string());
                }
                if self.api_version.trim().is_empty() {
                    return Err("api_version cannot be empty for azure".to_string());
                }
            }
        }

        if let Some(base) = &self.api_base {
            let parsed = url::Url::parse(base).map_err(|e| format!("invalid api_base {}: {}", base, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("api_base must be http(s): {}", base));
            }
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }
        if self.completion_window.trim().is_empty() {
            return Err("completion_window cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for ModelSettings {
    fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model cannot be empty".to_string());
        }
        if !self.endpoint.starts_with('/') {
            return Err(format!("endpoint must be a path, got {}", self.endpoint));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!("temperature {} is outside 0.0-2.0", temperature));
            }
        }
        if self.max_tokens == Some(0) {
            return Err("max_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for LimitsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_items == 0 || self.max_line_bytes == 0 || self.max_file_bytes == 0 {
            return Err("limits must be greater than 0".to_string());
        }
        if self.max_line_bytes > self.max_file_bytes {
            return Err("max_line_bytes cannot exceed max_file_bytes".to_string());
        }
        Ok(())
    }
}

impl Validate for RetrySettings {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("base_delay_ms cannot exceed max_delay_ms".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }
        Ok(())
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.level.trim().is_empty() {
            return Err("logging level cannot be empty".to_string());
        }
        Ok(())
    }
}

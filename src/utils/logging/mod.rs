//! Logging initialisation
//!
//! One `tracing-subscriber` setup for the binary: `RUST_LOG` wins over the
//! configured level, output goes to stderr so command output on stdout stays
//! machine-readable.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::utils::error::{BatchError, Result};

/// Build the filter from `RUST_LOG`, falling back to the configured level
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| BatchError::Config(format!("Invalid log level {:?}: {}", config.level, e))),
    }
}

/// Install the global subscriber
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| BatchError::Config(format!("Failed to initialise logging: {}", e)))
}

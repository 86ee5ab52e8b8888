//! Validation trait definition

/// Validation trait for configuration sections
///
/// Returns a human-readable reason on failure; `Config::validate` wraps it
/// into `BatchError::Config` with the section name.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;
use std::path::Path;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a number is within range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a configured path is an existing directory
    pub fn is_directory(value: &Path, field: &str) -> Result<()> {
        if !value.is_dir() {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an existing directory: {}",
                field,
                value.display()
            )));
        }
        Ok(())
    }
}

// Layered configuration builder

use crate::{ConfigManager, FileFormat, Result};
use std::path::PathBuf;

enum Source {
    File(PathBuf, FileFormat),
    AutoFile(PathBuf),
    OptionalFile(PathBuf),
    Dotenv(Option<PathBuf>),
    Env,
}

/// Builds a [`ConfigManager`] from sources applied in the order they are added.
#[derive(Default)]
pub struct ConfigBuilder {
    prefix: Option<String>,
    sources: Vec<Source>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set environment variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Add configuration file to load
    pub fn add_file(mut self, path: impl Into<PathBuf>, format: FileFormat) -> Self {
        self.sources.push(Source::File(path.into(), format));
        self
    }

    /// Add a file whose format follows from its extension
    pub fn add_auto_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::AutoFile(path.into()));
        self
    }

    /// Add a file that is skipped when it does not exist
    pub fn add_optional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::OptionalFile(path.into()));
        self
    }

    /// Enable loading from .env file
    pub fn load_dotenv(mut self, path: Option<PathBuf>) -> Self {
        self.sources.push(Source::Dotenv(path));
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.sources.push(Source::Env);
        self
    }

    /// Build the configuration manager
    pub fn build(self) -> Result<ConfigManager> {
        let manager = match self.prefix {
            Some(prefix) => ConfigManager::with_prefix(prefix),
            None => ConfigManager::new(),
        };

        for source in self.sources {
            match source {
                Source::File(path, format) => manager.load_file(&path, format)?,
                Source::AutoFile(path) => manager.load_auto(&path)?,
                Source::OptionalFile(path) => {
                    if path.is_file() {
                        manager.load_auto(&path)?;
                    }
                }
                Source::Dotenv(path) => manager.load_dotenv(path.as_deref())?,
                Source::Env => manager.load_env()?,
            }
        }

        Ok(manager)
    }
}

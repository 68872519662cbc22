//! Configuration management for the Trellis runtime.
//!
//! [`ConfigManager`] holds one nested table addressed by dotted keys
//! (`security.level`, `paths.controllers`). Files, `.env` files and the
//! process environment are merged into it, later sources overriding earlier
//! ones. It implements [`trellis_core::ConfigSource`], so it can be handed
//! straight to the system builder.
//!
//! ```no_run
//! use trellis_config::{ConfigManager, FileFormat};
//!
//! let config = ConfigManager::builder()
//!     .with_prefix("TRELLIS")
//!     .add_file("config/app.toml", FileFormat::Toml)
//!     .load_env()
//!     .build()?;
//!
//! let level: u8 = config.get_or("security.level", 10);
//! # Ok::<(), trellis_config::ConfigError>(())
//! ```

pub mod builder;
pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
mod tree;
pub mod validation;

pub use builder::ConfigBuilder;
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{CacheSettings, PathSettings, SecuritySettings, Settings};
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use trellis_core::ConfigSource;

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Value>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(Value::Object(Map::new()))),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Wrap an existing JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ConfigError::ParseError(
                "Configuration root must be an object".to_string(),
            ));
        }
        let manager = Self::new();
        *manager.config.write() = value;
        Ok(manager)
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.apply_env(loader.load()?)
    }

    fn apply_env(&self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        let mut config = self.config.write();
        for (key, value) in vars {
            tree::insert(&mut config, &key, Value::String(value))?;
        }
        Ok(())
    }

    /// Load configuration from .env file, then the environment
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            // A missing .env in the working directory is fine.
            dotenvy::dotenv().ok();
        }
        self.load_env()
    }

    /// Load configuration from file, merging it over what is already set
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;
        tree::merge(&mut self.config.write(), data);
        Ok(())
    }

    /// Load a file whose format follows from its extension
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        tree::merge(&mut self.config.write(), data);
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        tree::insert(&mut self.config.write(), key, json_value)
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .raw(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get an integer value; numeric strings from the environment count
    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.raw(key) {
            Some(Value::String(s)) => s.trim().parse().map_err(|_| {
                ConfigError::DeserializationError(format!("{} is not an integer: {}", key, s))
            }),
            _ => self.get(key),
        }
    }

    /// Get a boolean value; `"true"`/`"false"` strings count
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.raw(key) {
            Some(Value::String(s)) => s.trim().parse().map_err(|_| {
                ConfigError::DeserializationError(format!("{} is not a boolean: {}", key, s))
            }),
            _ => self.get(key),
        }
    }

    /// Get a float value
    pub fn get_float(&self, key: &str) -> Result<f64> {
        match self.raw(key) {
            Some(Value::String(s)) => s.trim().parse().map_err(|_| {
                ConfigError::DeserializationError(format!("{} is not a number: {}", key, s))
            }),
            _ => self.get(key),
        }
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        tree::lookup(&self.config.read(), key).is_some()
    }

    /// Dotted keys of every leaf value
    pub fn keys(&self) -> Vec<String> {
        tree::leaf_keys(&self.config.read())
    }

    /// Merge configuration from another manager
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        let overlay = other.snapshot();
        tree::merge(&mut self.config.write(), overlay);
        Ok(())
    }

    /// The whole table
    pub fn snapshot(&self) -> Value {
        self.config.read().clone()
    }

    /// Load and validate configuration
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(self.snapshot())
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }

    /// The runtime's own keys, validated
    pub fn settings(&self) -> Result<Settings> {
        self.load_validated()
    }

    fn raw(&self, key: &str) -> Option<Value> {
        tree::lookup(&self.config.read(), key).cloned()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for ConfigManager {
    fn value(&self, key: &str) -> Option<Value> {
        self.raw(key)
    }
}

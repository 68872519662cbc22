// Environment variable loading
//
// With the prefix `TRELLIS`, `TRELLIS_SECURITY__LEVEL=3` becomes the key
// `security.level`: the prefix and its separator are dropped, the rest is
// lowercased and `__` separates nesting levels.

use crate::{ConfigError, Result};
use std::collections::BTreeMap;
use std::env;

/// Environment variable loader
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.map(|p| p.trim_end_matches('_').to_uppercase()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Load every matching environment variable, keyed by dotted config key
    pub fn load(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    /// Map `(name, value)` pairs to dotted keys, skipping names outside the prefix
    pub fn collect<I>(&self, vars: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(name, value)| self.key_for(&name).map(|key| (key, value)))
            .collect()
    }

    /// The dotted config key for a variable name, if it carries the prefix
    pub fn key_for(&self, name: &str) -> Option<String> {
        let rest = match &self.prefix {
            Some(prefix) => name.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
            None => name,
        };

        let key = rest
            .split("__")
            .filter(|part| !part.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(".");

        (!key.is_empty()).then_some(key)
    }

    /// The variable name a dotted config key is read from
    pub fn var_name(&self, key: &str) -> String {
        let name = key.split('.').collect::<Vec<_>>().join("__").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, name),
            None => name,
        }
    }

    /// Load a specific environment variable by dotted config key
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.var_name(key)).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }
}

// Typed view of the keys the runtime reads

use crate::validation::{ConfigValidator, Validate};
use crate::Result;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use trellis_core::SecurityLevel;

/// The runtime's configuration keys.
///
/// `security.level` defaults to the strictest level; every path is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub security: SecuritySettings,
    pub paths: PathSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Environment sources deliver the level as a string
    #[serde(deserialize_with = "number_or_string")]
    pub level: u8,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            level: SecurityLevel::MAX.get(),
        }
    }
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u8),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(level) => Ok(level),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid security level: {}", text))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory of controller manifests
    pub controllers: Option<PathBuf>,
    /// Directory of service manifests resolved at boot
    pub services: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub directory: Option<PathBuf>,
}

impl Settings {
    pub fn security_level(&self) -> Result<SecurityLevel> {
        SecurityLevel::new(self.security.level)
            .map_err(|e| crate::ConfigError::ValidationError(e.to_string()))
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::in_range(
            self.security.level,
            SecurityLevel::MIN.get(),
            SecurityLevel::MAX.get(),
            "security.level",
        )?;

        let paths = [
            ("paths.controllers", &self.paths.controllers),
            ("paths.services", &self.paths.services),
            ("cache.directory", &self.cache.directory),
        ];
        for (field, path) in paths {
            if let Some(path) = path {
                ConfigValidator::is_directory(path, field)?;
            }
        }

        Ok(())
    }
}

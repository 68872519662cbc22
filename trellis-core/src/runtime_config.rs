// Runtime mode, read once from the environment

use std::env;
use std::fmt;

/// Environment variable selecting the runtime mode.
pub const RUNTIME_MODE_VAR: &str = "TRELLIS_ENV";

/// Production enables the route cache. An unset variable means production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl RuntimeMode {
    pub fn from_env() -> Self {
        Self::from_value(env::var(RUNTIME_MODE_VAR).ok().as_deref())
    }

    /// `None` and `"production"`/`"prod"` (any case) are production,
    /// every other value is development.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            None => RuntimeMode::Production,
            Some(v) if v == "production" || v == "prod" => RuntimeMode::Production,
            Some(_) => RuntimeMode::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        *self == RuntimeMode::Production
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::Production => f.write_str("production"),
            RuntimeMode::Development => f.write_str("development"),
        }
    }
}

//! Security rule engine.
//!
//! Objects the framework manages are checked against a cumulative chain of
//! structural rules before they are trusted: checking level N runs every rule
//! from level 1 through N in ascending order and stops at the first failure.

use crate::instance::Instance;
use crate::logging::{debug, warn};
use crate::reflection::{
    ClassDescriptor, FieldDescriptor, MethodDescriptor, ParamDescriptor, Reflector,
};
use crate::rules::{Rule, default_rules};
use crate::traits::ConfigSource;
use crate::{Error, Result, SecurityException};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Namespace whose classes are always subject to analysis.
pub const FRAMEWORK_NAMESPACE: &str = "trellis";

/// Class identifier of the engine itself.
pub const SECURITY_ENGINE_CLASS: &str = "trellis::security::SecurityEngine";

/// Configuration key holding the level.
pub const SECURITY_LEVEL_KEY: &str = "security.level";

/// A security level between 1 and 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    pub const MIN: SecurityLevel = SecurityLevel(1);
    pub const MAX: SecurityLevel = SecurityLevel(10);

    pub fn new(level: u8) -> Result<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&level) {
            Ok(Self(level))
        } else {
            Err(Error::Config(format!(
                "Security level must be between {} and {}, got {}",
                Self::MIN.0,
                Self::MAX.0,
                level
            )))
        }
    }

    /// Clamp `level` into the valid range.
    pub const fn of(level: u8) -> Self {
        if level < Self::MIN.0 {
            Self::MIN
        } else if level > Self::MAX.0 {
            Self::MAX
        } else {
            Self(level)
        }
    }

    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Read [`SECURITY_LEVEL_KEY`]; a missing key means the strictest level.
    pub fn from_config(config: &dyn ConfigSource) -> Result<Self> {
        match config.value(SECURITY_LEVEL_KEY) {
            None | Some(Value::Null) => Ok(Self::MAX),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| Error::Config(format!("Invalid security level: {}", n)))
                .and_then(Self::new),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u8>()
                .map_err(|_| Error::Config(format!("Invalid security level: {}", s)))
                .and_then(Self::new),
            Some(other) => Err(Error::Config(format!("Invalid security level: {}", other))),
        }
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::MAX
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runs the cumulative rule chain up to a configured level.
pub struct SecurityEngine {
    level: SecurityLevel,
    rules: Vec<Box<dyn Rule>>,
    reflector: Arc<Reflector>,
    namespace: String,
}

impl SecurityEngine {
    pub fn new(level: SecurityLevel, reflector: Arc<Reflector>) -> Self {
        Self::with_rules(level, reflector, default_rules(FRAMEWORK_NAMESPACE))
    }

    /// Use a custom rule chain. Rules are ordered by level, stable within one.
    pub fn with_rules(
        level: SecurityLevel,
        reflector: Arc<Reflector>,
        mut rules: Vec<Box<dyn Rule>>,
    ) -> Self {
        rules.sort_by_key(|rule| rule.level());
        Self {
            level,
            rules,
            reflector,
            namespace: FRAMEWORK_NAMESPACE.to_string(),
        }
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether instances of `class` are analyzed when the container builds them.
    pub fn governs(&self, class: &ClassDescriptor) -> bool {
        class.managed || class.in_namespace(&self.namespace)
    }

    /// Check that `instance` is each of `expected` and passes every rule up
    /// to the configured level.
    pub fn analyze(&self, instance: &Instance, expected: &[&str]) -> Result<()> {
        let class = instance.class();

        for ty in expected {
            if !self.reflector.is_a(class, ty) {
                warn!(class = %class.name, expected = ty, "Instance type check failed");
                return Err(SecurityException::new(format!(
                    "Object of class {} is not an instance of {}",
                    class.name, ty
                ))
                .into());
            }
        }

        for rule in self.rules.iter().filter(|rule| rule.level() <= self.level) {
            if let Err(message) = rule.check(instance) {
                warn!(
                    class = %class.name,
                    level = rule.level().get(),
                    rule = rule.name(),
                    "Security rule failed"
                );
                return Err(SecurityException::new(message).into());
            }
        }

        debug!(class = %class.name, level = self.level.get(), "Security analysis passed");
        Ok(())
    }

    /// Metadata of the engine itself, as seen by the rules it enforces.
    pub fn descriptor() -> ClassDescriptor {
        ClassDescriptor::of::<SecurityEngine>(SECURITY_ENGINE_CLASS)
            .final_class()
            .readonly_class()
            .field(FieldDescriptor::private("level").typed("SecurityLevel").readonly())
            .field(FieldDescriptor::private("rules").typed("Vec<Box<dyn Rule>>").readonly())
            .field(FieldDescriptor::private("reflector").typed("Arc<Reflector>").readonly())
            .field(FieldDescriptor::private("namespace").typed("string").readonly())
            .method(MethodDescriptor::public("level").returns("SecurityLevel"))
            .method(MethodDescriptor::public("namespace").returns("string"))
            .method(
                MethodDescriptor::public("governs")
                    .param(ParamDescriptor::new("class").typed("ClassDescriptor"))
                    .returns("bool"),
            )
            .method(
                MethodDescriptor::public("analyze")
                    .param(ParamDescriptor::new("instance").typed("Instance"))
                    .param(ParamDescriptor::new("expected").typed("array"))
                    .returns("Result"),
            )
    }
}

impl fmt::Debug for SecurityEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityEngine")
            .field("level", &self.level)
            .field("rules", &self.rules.len())
            .field("namespace", &self.namespace)
            .finish()
    }
}

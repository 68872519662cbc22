// Collaborator traits consumed by the runtime core

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Read-only, dotted-key configuration lookup.
pub trait ConfigSource: Send + Sync {
    /// The raw value stored under `key` (e.g. `"security.level"`).
    fn value(&self, key: &str) -> Option<Value>;
}

/// Typed helpers over any [`ConfigSource`].
pub trait ConfigSourceExt: ConfigSource {
    /// Deserialize `key`, falling back to `default` when missing or mistyped.
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.value(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl<C: ConfigSource + ?Sized> ConfigSourceExt for C {}

/// A JSON document is a configuration source: dotted keys walk nested objects.
impl ConfigSource for Value {
    fn value(&self, key: &str) -> Option<Value> {
        key.split('.')
            .try_fold(self, |node, segment| node.get(segment))
            .cloned()
    }
}

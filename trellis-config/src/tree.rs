// Dotted-key access into nested JSON tables

use crate::{ConfigError, Result};
use serde_json::{Map, Value};

pub(crate) fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Store `value` under `key`, creating intermediate tables.
///
/// Fails instead of replacing a scalar that sits on the path.
pub(crate) fn insert(root: &mut Value, key: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::KeyConflict(format!("Invalid key: '{}'", key)));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ConfigError::KeyConflict(format!("Invalid key: '{}'", key)))?;

    let mut node = root;
    for segment in parents {
        let table = table_mut(node, key)?;
        node = table
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    table_mut(node, key)?.insert(last.to_string(), value);
    Ok(())
}

fn table_mut<'a>(node: &'a mut Value, key: &str) -> Result<&'a mut Map<String, Value>> {
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut().ok_or_else(|| {
        ConfigError::KeyConflict(format!("'{}' passes through a non-table value", key))
    })
}

/// Deep merge: tables merge key by key, anything else is replaced.
pub(crate) fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Dotted keys of every leaf, sorted.
pub(crate) fn leaf_keys(root: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect_keys(root, String::new(), &mut keys);
    keys.sort();
    keys
}

fn collect_keys(node: &Value, prefix: String, keys: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_keys(value, path, keys);
            }
        }
        _ if !prefix.is_empty() => keys.push(prefix),
        _ => {}
    }
}

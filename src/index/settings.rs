//! Index settings flattening and classification

use crate::engine::Settings;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Settings keyed by dotted path, without the `index.` prefix
pub type FlatSettings = BTreeMap<String, Value>;

/// Keys fixed at creation time
const CRITICAL_KEYS: &[&str] = &[
    "number_of_shards",
    "number_of_routing_shards",
    "routing_partition_size",
    "codec",
    "store.type",
    "mode",
];

/// Key prefixes fixed at creation time
const CRITICAL_PREFIXES: &[&str] = &["sort.", "analysis.", "soft_deletes."];

/// Flatten nested, dotted or bare keys into one canonical form.
///
/// `{"index": {"number_of_shards": 1}}`, `{"index.number_of_shards": 1}` and
/// `{"number_of_shards": 1}` all become `number_of_shards`. Arrays are leaves.
pub fn flatten_settings(settings: &Settings) -> FlatSettings {
    let mut flat = FlatSettings::new();
    for (key, value) in settings {
        flatten_into(key, value, &mut flat);
    }
    flat
}

fn flatten_into(path: &str, value: &Value, out: &mut FlatSettings) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{}.{}", path, key), child, out);
            }
        }
        leaf => {
            let key = path.strip_prefix("index.").unwrap_or(path);
            if key != "index" {
                out.insert(key.to_string(), leaf.clone());
            }
        }
    }
}

/// Whether a flattened key can only be set at creation
pub fn is_critical(key: &str) -> bool {
    CRITICAL_KEYS.contains(&key) || CRITICAL_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Critical keys present in `flat`, sorted
pub fn critical_keys(flat: &FlatSettings) -> Vec<String> {
    flat.keys().filter(|k| is_critical(k)).cloned().collect()
}

/// Render flattened settings in the engine's `index.`-prefixed form
pub fn to_engine_settings(flat: &FlatSettings) -> Settings {
    flat.iter()
        .map(|(key, value)| (format!("index.{}", key), value.clone()))
        .collect::<Map<String, Value>>()
}

/// Read a count setting given as a number or a numeric string
pub fn count_value(flat: &FlatSettings, key: &str) -> Option<Result<u64, String>> {
    let value = flat.get(key)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Some(parsed.ok_or_else(|| format!("setting '{}' must be a non-negative integer, got {}", key, value)))
}

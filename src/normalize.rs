//! MailChimp payloads nest objects inside arrays inside objects (`members`,
//! `merge_fields`, `_links`, ...). Before a payload is turned into a record it
//! is rebuilt depth-first so that every object, at every level, is a
//! key-ordered map.

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;

/// Rebuild `value` with every object key-ordered. Arrays keep their element
/// order. Idempotent.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        scalar => scalar,
    }
}

/// Normalize a top-level payload into a map. A top-level array becomes a map
/// keyed by element index; a scalar yields an empty map.
pub fn normalize_payload(payload: Value) -> Map<String, Value> {
    match normalize(payload) {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        _ => Map::new(),
    }
}

fn normalize_map(map: Map<String, Value>) -> Map<String, Value> {
    // children first, then order the keys
    let ordered: BTreeMap<String, Value> = map
        .into_iter()
        .map(|(key, value)| (key, normalize(value)))
        .collect();
    ordered.into_iter().collect()
}

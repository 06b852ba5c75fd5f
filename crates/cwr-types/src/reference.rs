//! Helpers for reading and writing JSON-LD references.
//!
//! A reference is a node object holding only `@id`. Source objects may also
//! carry bare identifier strings where their context coerces the term to
//! `@id`, and single values where a list would be expected.

use serde_json::{json, Map, Value};

/// Build a reference object `{"@id": id}`.
pub fn reference(id: impl Into<String>) -> Value {
    json!({ "@id": id.into() })
}

/// The `@id` of a reference object, if `value` is one.
pub fn reference_id(value: &Value) -> Option<&str> {
    value.as_object()?.get("@id")?.as_str()
}

/// All reference ids in a single value or a list of values.
pub fn reference_ids(value: &Value) -> Vec<&str> {
    as_list(value).into_iter().filter_map(reference_id).collect()
}

/// The string form of either a bare string or a reference object.
pub fn string_or_reference(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        other => reference_id(other),
    }
}

/// View a value as a list: arrays yield their items, anything else itself.
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Unwrap a `{"@value": v}` wrapper into `v`; other values are returned as-is.
pub fn unwrap_value(value: Value) -> Value {
    match value {
        Value::Object(mut map) if is_value_wrapper(&map) => {
            map.remove("@value").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn is_value_wrapper(map: &Map<String, Value>) -> bool {
    map.contains_key("@value") && map.keys().all(|k| k.starts_with('@'))
}

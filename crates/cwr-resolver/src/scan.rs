use std::collections::BTreeSet;

use cwr_types::{IdPrefix, ObjectId};
use serde_json::Value;

/// Collect every string inside `value` that is a reference into the store.
///
/// Strings are found as bare property values and anywhere inside nested
/// objects and lists. Values under an `@id` key are never collected, so a
/// node does not discover itself.
pub fn collect_references(value: &Value, prefix: &IdPrefix, out: &mut BTreeSet<ObjectId>) {
    match value {
        Value::String(s) if prefix.matches(s) => {
            out.insert(ObjectId::new(s.as_str()));
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, prefix, out);
            }
        }
        Value::Object(map) => {
            for (key, v) in map {
                if key == "@id" {
                    continue;
                }
                collect_references(v, prefix, out);
            }
        }
        _ => {}
    }
}

/// References of a single value, in sorted order.
pub fn references_of(value: &Value, prefix: &IdPrefix) -> BTreeSet<ObjectId> {
    let mut out = BTreeSet::new();
    collect_references(value, prefix, &mut out);
    out
}

use serde_json::{json, Map, Value};

use crate::context::{is_keyword, ActiveContext, TermDefinition};

/// Compacts flattened node objects against an active context.
#[derive(Debug, Clone, Copy)]
pub struct Compactor<'a> {
    ctx: &'a ActiveContext,
}

impl<'a> Compactor<'a> {
    pub fn new(ctx: &'a ActiveContext) -> Self {
        Self { ctx }
    }

    /// Compact one expanded node object.
    pub fn compact_node(&self, node: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(Value::String(id)) = node.get("@id") {
            out.insert("@id".into(), Value::String(self.compact_iri(id, false)));
        }
        if let Some(Value::Array(types)) = node.get("@type") {
            let mut compacted: Vec<Value> = types
                .iter()
                .filter_map(Value::as_str)
                .map(|t| Value::String(self.compact_iri(t, true)))
                .collect();
            let value = if compacted.len() == 1 {
                compacted.remove(0)
            } else {
                Value::Array(compacted)
            };
            out.insert("@type".into(), value);
        }
        for keyword in ["@index", "@language"] {
            if let Some(v) = node.get(keyword) {
                out.insert(keyword.into(), v.clone());
            }
        }

        let mut properties: Vec<&String> = node.keys().filter(|k| !is_keyword(k)).collect();
        properties.sort();
        for iri in properties {
            let Value::Array(items) = &node[iri.as_str()] else {
                continue;
            };
            if items.is_empty() {
                let key = self
                    .select_term(iri, None)
                    .unwrap_or_else(|| self.compact_iri_without_terms(iri, true));
                out.entry(key).or_insert_with(|| Value::Array(Vec::new()));
                continue;
            }
            for item in items {
                let key = self
                    .select_term(iri, Some(item))
                    .unwrap_or_else(|| self.compact_iri_without_terms(iri, true));
                let definition = self.ctx.term(&key);
                let compacted = self.compact_item(item, definition);
                match out
                    .entry(key)
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(values) => values.push(compacted),
                    other => *other = Value::Array(vec![compacted]),
                }
            }
        }

        // Single values lose their array unless the term asks for one.
        for (key, value) in out.iter_mut() {
            if key.starts_with('@') {
                continue;
            }
            let definition = self.ctx.term(key);
            let Value::Array(values) = value else {
                continue;
            };
            if values.len() != 1 {
                continue;
            }
            if definition.is_some_and(TermDefinition::is_list) {
                if values[0].is_array() {
                    let single = values.remove(0);
                    *value = single;
                }
            } else if !definition.is_some_and(TermDefinition::is_set) {
                let single = values.remove(0);
                *value = single;
            }
        }
        out
    }

    fn compact_item(&self, item: &Value, definition: Option<&TermDefinition>) -> Value {
        let Value::Object(map) = item else {
            return item.clone();
        };
        let type_mapping = definition.and_then(|d| d.type_mapping.as_deref());

        if let Some(items) = map.get("@list") {
            let compacted: Vec<Value> = items
                .as_array()
                .map(|items| items.iter().map(|i| self.compact_item(i, definition)).collect())
                .unwrap_or_default();
            return if definition.is_some_and(TermDefinition::is_list) {
                Value::Array(compacted)
            } else {
                json!({ "@list": compacted })
            };
        }

        if let Some(value) = map.get("@value") {
            let value_type = map.get("@type").and_then(Value::as_str);
            let has_language = map.contains_key("@language");
            return match (value_type, type_mapping) {
                (Some(t), Some(m)) if t == m => value.clone(),
                (None, None) if !has_language => value.clone(),
                (Some(t), _) => json!({"@value": value, "@type": self.compact_iri(t, true)}),
                _ => {
                    let mut out = map.clone();
                    out.remove("@index");
                    Value::Object(out)
                }
            };
        }

        if let Some(Value::String(id)) = map.get("@id") {
            if map.len() == 1 {
                return match type_mapping {
                    Some("@id") => Value::String(self.compact_iri(id, false)),
                    Some("@vocab") => Value::String(self.compact_iri(id, true)),
                    _ => json!({ "@id": self.compact_iri(id, false) }),
                };
            }
        }
        Value::Object(self.compact_node(map))
    }

    /// Pick the term for `iri` that best fits `value`.
    ///
    /// Candidates are ranked by fit, then by length, then lexicographically.
    fn select_term(&self, iri: &str, value: Option<&Value>) -> Option<String> {
        let mut best: Option<(u8, usize, &String)> = None;
        for (term, definition) in self.ctx.terms() {
            if definition.iri.as_deref() != Some(iri) {
                continue;
            }
            let Some(rank) = fit(definition, value) else {
                continue;
            };
            let candidate = (rank, term.len(), term);
            if best.map_or(true, |b| candidate < b) {
                best = Some(candidate);
            }
        }
        best.map(|(_, _, term)| term.clone())
    }

    /// Compact an IRI used as `@id` (`vocab == false`) or as a type or
    /// property (`vocab == true`).
    pub fn compact_iri(&self, iri: &str, vocab: bool) -> String {
        if vocab {
            if let Some(term) = self.select_term(iri, None) {
                return term;
            }
        }
        self.compact_iri_without_terms(iri, vocab)
    }

    fn compact_iri_without_terms(&self, iri: &str, vocab: bool) -> String {
        if vocab {
            if let Some(suffix) = self.ctx.vocab().and_then(|v| iri.strip_prefix(v)) {
                if !suffix.is_empty() && self.ctx.term(suffix).is_none() {
                    return suffix.to_string();
                }
            }
        }

        let mut best: Option<String> = None;
        for (term, definition) in self.ctx.terms() {
            if !definition.prefix {
                continue;
            }
            let Some(prefix_iri) = definition.iri.as_deref() else {
                continue;
            };
            let Some(suffix) = iri.strip_prefix(prefix_iri) else {
                continue;
            };
            if suffix.is_empty() {
                continue;
            }
            let candidate = format!("{term}:{suffix}");
            let clashes = self
                .ctx
                .term(&candidate)
                .is_some_and(|d| d.iri.as_deref() != Some(iri));
            if clashes {
                continue;
            }
            let shorter = best.as_ref().map_or(true, |b| {
                (candidate.len(), &candidate) < (b.len(), b)
            });
            if shorter {
                best = Some(candidate);
            }
        }
        if let Some(compact) = best {
            return compact;
        }

        if !vocab {
            if let Some(relative) = self.ctx.base().and_then(|b| iri.strip_prefix(b)) {
                if !relative.is_empty() {
                    return relative.to_string();
                }
            }
        }
        iri.to_string()
    }
}

/// How well a term definition fits a value; lower is better, `None` means
/// the term cannot carry the value.
fn fit(definition: &TermDefinition, value: Option<&Value>) -> Option<u8> {
    let mapping = definition.type_mapping.as_deref();
    let Some(Value::Object(map)) = value else {
        // Plain type or property position.
        return Some(if mapping.is_none() && definition.container.is_none() { 0 } else { 1 });
    };

    if map.contains_key("@list") {
        return match (definition.is_list(), mapping) {
            (true, _) => Some(0),
            (false, None) => Some(1),
            _ => None,
        };
    }
    if definition.is_list() {
        return None;
    }

    if let Some(value_type) = map.get("@value").map(|_| map.get("@type").and_then(Value::as_str)) {
        return match (value_type, mapping) {
            (Some(t), Some(m)) if t == m => Some(0),
            (None, None) => Some(0),
            (_, None) => Some(1),
            _ => None,
        };
    }

    match mapping {
        Some("@id") | Some("@vocab") if map.len() == 1 => Some(0),
        None => Some(1),
        _ => None,
    }
}

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::context::{is_keyword, ActiveContext, Documents};
use crate::error::{JsonLdError, JsonLdResult};

/// Expand a document into a list of expanded node objects.
///
/// Properties that do not map to an absolute IRI are dropped. Top-level
/// values and nodes carrying nothing but `@id` are dropped as well.
pub fn expand(input: &Value, context: &ActiveContext, documents: &Documents) -> JsonLdResult<Vec<Value>> {
    Expander { documents }.expand(context, None, input)
}

struct Expander<'a> {
    documents: &'a Documents,
}

impl Expander<'_> {
    fn expand(
        &self,
        context: &ActiveContext,
        property: Option<&str>,
        element: &Value,
    ) -> JsonLdResult<Vec<Value>> {
        match element {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.expand(context, property, item)?);
                }
                Ok(out)
            }
            Value::Object(map) => self.expand_object(context, property, map),
            scalar => match property {
                None | Some("@graph") => Ok(Vec::new()),
                Some(term) => Ok(vec![expand_value(context, term, scalar)]),
            },
        }
    }

    fn expand_object(
        &self,
        context: &ActiveContext,
        property: Option<&str>,
        map: &Map<String, Value>,
    ) -> JsonLdResult<Vec<Value>> {
        let scoped;
        let context = match map.get("@context") {
            Some(local) => {
                scoped = context.process(local, self.documents)?;
                &scoped
            }
            None => context,
        };

        let mut result = Map::new();
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            if key == "@context" {
                continue;
            }
            let value = &map[key];
            let Some(expanded) = context.expand_iri(key, true, false) else {
                continue;
            };
            if is_keyword(&expanded) {
                self.expand_keyword(context, property, &expanded, value, &mut result)?;
                continue;
            }
            if !expanded.contains(':') {
                debug!(term = %key, "dropping property without IRI mapping");
                continue;
            }

            let definition = context.term(key);
            let mut items = if definition.and_then(|d| d.type_mapping.as_deref()) == Some("@json") {
                vec![json!({"@value": value, "@type": "@json"})]
            } else {
                self.expand(context, Some(key), value)?
            };
            if definition.is_some_and(|d| d.is_list())
                && !(items.len() == 1 && items[0].get("@list").is_some())
            {
                items = vec![json!({ "@list": items })];
            }
            match result
                .entry(expanded)
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(existing) => existing.extend(items),
                other => *other = Value::Array(items),
            }
        }

        if let Some(v) = result.get("@value") {
            if v.is_null() {
                return Ok(Vec::new());
            }
            if result
                .keys()
                .any(|k| !matches!(k.as_str(), "@value" | "@type" | "@language" | "@index"))
            {
                return Err(JsonLdError::InvalidKeywordValue {
                    keyword: "@value",
                    reason: "value object with additional properties".into(),
                });
            }
            if let Some(Value::Array(types)) = result.get("@type").cloned() {
                match types.as_slice() {
                    [single] => {
                        result.insert("@type".into(), single.clone());
                    }
                    _ => {
                        return Err(JsonLdError::InvalidKeywordValue {
                            keyword: "@type",
                            reason: "value object with multiple types".into(),
                        })
                    }
                }
            }
            return Ok(match property {
                None | Some("@graph") => Vec::new(),
                Some(_) => vec![Value::Object(result)],
            });
        }
        if let Some(set) = result.remove("@set") {
            return Ok(match set {
                Value::Array(items) => items,
                other => vec![other],
            });
        }
        if result.contains_key("@list") {
            return Ok(match property {
                None | Some("@graph") => Vec::new(),
                Some(_) => vec![Value::Object(result)],
            });
        }
        if result.len() == 1 && result.contains_key("@language") {
            return Ok(Vec::new());
        }
        if matches!(property, None | Some("@graph")) {
            if result.is_empty() || (result.len() == 1 && result.contains_key("@id")) {
                return Ok(Vec::new());
            }
            if property.is_none() && result.len() == 1 {
                if let Some(Value::Array(graph)) = result.get("@graph") {
                    return Ok(graph.clone());
                }
            }
        }
        Ok(vec![Value::Object(result)])
    }

    fn expand_keyword(
        &self,
        context: &ActiveContext,
        property: Option<&str>,
        keyword: &str,
        value: &Value,
        result: &mut Map<String, Value>,
    ) -> JsonLdResult<()> {
        match keyword {
            "@id" => {
                let Value::String(id) = value else {
                    return Err(JsonLdError::InvalidKeywordValue {
                        keyword: "@id",
                        reason: "must be a string".into(),
                    });
                };
                let expanded = context
                    .expand_iri(id, false, true)
                    .unwrap_or_else(|| id.clone());
                result.insert("@id".into(), Value::String(expanded));
            }
            "@type" => {
                let raw: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                let mut types = Vec::with_capacity(raw.len());
                for t in raw {
                    let Value::String(t) = t else {
                        return Err(JsonLdError::InvalidKeywordValue {
                            keyword: "@type",
                            reason: "must be a string or a list of strings".into(),
                        });
                    };
                    if let Some(expanded) = context.expand_iri(t, true, true) {
                        types.push(Value::String(expanded));
                    }
                }
                result.insert("@type".into(), Value::Array(types));
            }
            "@value" => {
                if value.is_array() || value.is_object() {
                    return Err(JsonLdError::InvalidKeywordValue {
                        keyword: "@value",
                        reason: "must be a scalar".into(),
                    });
                }
                result.insert("@value".into(), value.clone());
            }
            "@language" | "@index" => {
                result.insert(keyword.to_string(), value.clone());
            }
            "@graph" => {
                let items = self.expand(context, Some("@graph"), value)?;
                result.insert("@graph".into(), Value::Array(items));
            }
            "@list" => {
                let items = self.expand(context, property, value)?;
                result.insert("@list".into(), Value::Array(items));
            }
            "@set" => {
                let items = self.expand(context, property, value)?;
                result.insert("@set".into(), Value::Array(items));
            }
            other => debug!(keyword = other, "ignoring unsupported keyword"),
        }
        Ok(())
    }
}

/// Expand a scalar under `term`, honouring the term's type mapping.
fn expand_value(context: &ActiveContext, term: &str, value: &Value) -> Value {
    let type_mapping = context.term(term).and_then(|d| d.type_mapping.as_deref());
    match (type_mapping, value) {
        (Some("@id"), Value::String(s)) => {
            json!({"@id": context.expand_iri(s, false, true).unwrap_or_else(|| s.clone())})
        }
        (Some("@vocab"), Value::String(s)) => {
            json!({"@id": context.expand_iri(s, true, true).unwrap_or_else(|| s.clone())})
        }
        (Some(t), _) if !matches!(t, "@id" | "@vocab" | "@none") => {
            json!({"@value": value, "@type": t})
        }
        _ => json!({ "@value": value }),
    }
}

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Map, Value};

/// Relabels blank nodes as `_:b0`, `_:b1`, ... in order of appearance.
#[derive(Debug, Default)]
struct BlankNodeIssuer {
    counter: usize,
    issued: HashMap<String, String>,
}

impl BlankNodeIssuer {
    fn issue(&mut self, existing: Option<&str>) -> String {
        if let Some(old) = existing {
            if let Some(new) = self.issued.get(old) {
                return new.clone();
            }
        }
        let id = format!("_:b{}", self.counter);
        self.counter += 1;
        if let Some(old) = existing {
            self.issued.insert(old.to_string(), id.clone());
        }
        id
    }
}

/// Node map of the default graph, built from expanded input.
///
/// Nested node objects are pulled out into their own entries and replaced by
/// references; named graphs are merged into the default graph.
#[derive(Debug, Default)]
pub struct NodeMap {
    nodes: BTreeMap<String, Map<String, Value>>,
    blank: BlankNodeIssuer,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one expanded element.
    pub fn add(&mut self, element: &Value) {
        self.generate(element, None, None, None);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flattened nodes ordered by identifier. Nodes that carry nothing but
    /// their `@id` are left out.
    pub fn into_flattened(self) -> Vec<Map<String, Value>> {
        self.nodes
            .into_values()
            .filter(|node| !(node.len() == 1 && node.contains_key("@id")))
            .collect()
    }

    fn generate(
        &mut self,
        element: &Value,
        subject: Option<&str>,
        property: Option<&str>,
        mut list: Option<&mut Vec<Value>>,
    ) {
        let map = match element {
            Value::Array(items) => {
                for item in items {
                    self.generate(item, subject, property, list.as_deref_mut());
                }
                return;
            }
            Value::Object(map) => map,
            _ => return,
        };

        if map.contains_key("@value") {
            match list {
                Some(list) => list.push(element.clone()),
                None => self.link(subject, property, element.clone(), true),
            }
            return;
        }

        if let Some(items) = map.get("@list") {
            let mut collected = Vec::new();
            self.generate(items, subject, property, Some(&mut collected));
            let list_object = json!({ "@list": collected });
            match list {
                Some(list) => list.push(list_object),
                None => self.link(subject, property, list_object, false),
            }
            return;
        }

        let id = match map.get("@id").and_then(Value::as_str) {
            Some(id) if id.starts_with("_:") => self.blank.issue(Some(id)),
            Some(id) => id.to_string(),
            None => self.blank.issue(None),
        };
        self.nodes.entry(id.clone()).or_insert_with(|| {
            let mut node = Map::new();
            node.insert("@id".into(), Value::String(id.clone()));
            node
        });

        let reference = json!({ "@id": id });
        match list {
            Some(list) => list.push(reference),
            None => self.link(subject, property, reference, true),
        }

        if let Some(types) = map.get("@type") {
            let types: Vec<&Value> = match types {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for t in types.into_iter().filter_map(Value::as_str) {
                let t = if t.starts_with("_:") {
                    self.blank.issue(Some(t))
                } else {
                    t.to_string()
                };
                self.add_value(&id, "@type", Value::String(t), true);
            }
        }

        let mut keys: Vec<&String> = map.keys().filter(|k| !k.starts_with('@')).collect();
        keys.sort();
        for key in keys {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.entry(key.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
            }
            self.generate(&map[key.as_str()], Some(&id), Some(key), None);
        }

        if let Some(graph) = map.get("@graph") {
            self.generate(graph, None, None, None);
        }
    }

    fn link(&mut self, subject: Option<&str>, property: Option<&str>, value: Value, unique: bool) {
        if let (Some(subject), Some(property)) = (subject, property) {
            self.add_value(subject, property, value, unique);
        }
    }

    fn add_value(&mut self, subject: &str, property: &str, value: Value, unique: bool) {
        let Some(node) = self.nodes.get_mut(subject) else {
            return;
        };
        let entry = node
            .entry(property.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            if !unique || !values.contains(&value) {
                values.push(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(input: Value) -> Vec<Map<String, Value>> {
        let mut map = NodeMap::new();
        map.add(&input);
        map.into_flattened()
    }

    #[test]
    fn nested_nodes_become_references() {
        let nodes = flatten(json!([{
            "@id": "cwr/ds",
            "@type": ["http://schema.org/Dataset"],
            "http://schema.org/author": [{
                "@id": "cwr/p",
                "http://schema.org/name": [{"@value": "Ada"}]
            }]
        }]));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["@id"], "cwr/ds");
        assert_eq!(nodes[0]["http://schema.org/author"], json!([{"@id": "cwr/p"}]));
        assert_eq!(nodes[1]["http://schema.org/name"], json!([{"@value": "Ada"}]));
    }

    #[test]
    fn objects_with_same_id_are_merged() {
        let nodes = flatten(json!([
            {"@id": "cwr/a", "@type": ["http://ex.org/T"], "http://ex.org/p": [{"@value": 1}]},
            {"@id": "cwr/a", "@type": ["http://ex.org/T", "http://ex.org/U"], "http://ex.org/p": [{"@value": 1}, {"@value": 2}]}
        ]));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["@type"], json!(["http://ex.org/T", "http://ex.org/U"]));
        assert_eq!(nodes[0]["http://ex.org/p"], json!([{"@value": 1}, {"@value": 2}]));
    }

    #[test]
    fn blank_nodes_are_relabelled_in_order() {
        let nodes = flatten(json!([{
            "@id": "cwr/a",
            "http://ex.org/q": [{"http://ex.org/v": [{"@value": "x"}]}],
            "http://ex.org/r": [{"@id": "_:orig", "http://ex.org/v": [{"@value": "y"}]}]
        }]));
        let ids: Vec<&str> = nodes.iter().map(|n| n["@id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["_:b0", "_:b1", "cwr/a"]);
        assert_eq!(nodes[2]["http://ex.org/r"], json!([{"@id": "_:b1"}]));
    }

    #[test]
    fn referenced_but_undescribed_nodes_are_left_out() {
        let nodes = flatten(json!([{
            "@id": "cwr/a",
            "http://ex.org/link": [{"@id": "https://elsewhere.org/x"}]
        }]));
        assert_eq!(nodes.len(), 1);
    }
}

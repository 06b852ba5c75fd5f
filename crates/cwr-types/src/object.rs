use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::id::ObjectId;

/// Closed classification of a node's `@type` tags.
///
/// A node may carry several tags; classification picks the first matching
/// shape in the order Person, File, Dataset, Action.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Person,
    File,
    Dataset,
    Action,
    Other(String),
}

impl ObjectType {
    /// Classify a list of type tags.
    pub fn classify<S: AsRef<str>>(tags: &[S]) -> Self {
        let has = |name: &str| tags.iter().any(|t| t.as_ref() == name);
        if has("Person") {
            Self::Person
        } else if has("File") || has("MediaObject") {
            Self::File
        } else if has("Dataset") {
            Self::Dataset
        } else if tags.iter().any(|t| t.as_ref().ends_with("Action")) {
            Self::Action
        } else {
            Self::Other(
                tags.first()
                    .map(|t| t.as_ref().to_string())
                    .unwrap_or_else(|| "Thing".to_string()),
            )
        }
    }

    /// Classify the `@type` value of a JSON node (string or list of strings).
    pub fn of_value(value: Option<&Value>) -> Self {
        Self::classify(&type_tags(value))
    }
}

/// Collect `@type` tags from a string or a list of strings.
pub fn type_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// A node of the source linked-data graph.
///
/// `properties` holds every key of the source object except `@id` and
/// `@type`, including its `@context` if it declared one.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkedObject {
    pub id: ObjectId,
    pub types: Vec<String>,
    pub properties: Map<String, Value>,
}

impl LinkedObject {
    pub fn new(id: impl Into<ObjectId>, types: Vec<String>) -> Self {
        Self {
            id: id.into(),
            types,
            properties: Map::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Parse a JSON node. The node must be an object with a string `@id`.
    pub fn from_json(value: Value) -> Result<Self, TypeError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(TypeError::NotAnObject(kind_of(&other).to_string())),
        };
        let id = match map.remove("@id") {
            Some(Value::String(id)) => ObjectId::new(id),
            _ => return Err(TypeError::MissingField("@id")),
        };
        let types = type_tags(map.get("@type"));
        map.remove("@type");
        Ok(Self {
            id,
            types,
            properties: map,
        })
    }

    /// Serialize back into a JSON node with `@id` and `@type` first.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("@id".into(), Value::String(self.id.to_string()));
        match self.types.as_slice() {
            [] => {}
            [single] => {
                map.insert("@type".into(), Value::String(single.clone()));
            }
            many => {
                map.insert(
                    "@type".into(),
                    Value::Array(many.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        for (k, v) in &self.properties {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }

    pub fn object_type(&self) -> ObjectType {
        ObjectType::classify(&self.types)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_prefers_person_then_file() {
        assert_eq!(ObjectType::classify(&["Person"]), ObjectType::Person);
        assert_eq!(ObjectType::classify(&["File", "SoftwareSourceCode"]), ObjectType::File);
        assert_eq!(ObjectType::classify(&["MediaObject"]), ObjectType::File);
        assert_eq!(ObjectType::classify(&["Dataset"]), ObjectType::Dataset);
        assert_eq!(ObjectType::classify(&["CreateAction"]), ObjectType::Action);
        assert_eq!(
            ObjectType::classify(&["Organization"]),
            ObjectType::Other("Organization".into())
        );
        assert_eq!(
            ObjectType::classify::<&str>(&[]),
            ObjectType::Other("Thing".into())
        );
    }

    #[test]
    fn from_json_splits_id_and_types() {
        let obj = LinkedObject::from_json(json!({
            "@id": "cwr/a",
            "@type": ["File", "SoftwareSourceCode"],
            "name": "workflow.yaml"
        }))
        .unwrap();
        assert_eq!(obj.id.as_str(), "cwr/a");
        assert_eq!(obj.types, vec!["File", "SoftwareSourceCode"]);
        assert_eq!(obj.get("name"), Some(&json!("workflow.yaml")));
        assert!(obj.get("@type").is_none());
        assert_eq!(obj.object_type(), ObjectType::File);
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert_eq!(
            LinkedObject::from_json(json!([1])),
            Err(TypeError::NotAnObject("array".into()))
        );
        assert_eq!(
            LinkedObject::from_json(json!({"name": "x"})),
            Err(TypeError::MissingField("@id"))
        );
    }

    #[test]
    fn to_json_restores_single_type_as_string() {
        let obj = LinkedObject::new("cwr/p", vec!["Person".into()]).with("name", json!("Ada"));
        assert_eq!(
            obj.to_json(),
            json!({"@id": "cwr/p", "@type": "Person", "name": "Ada"})
        );
    }
}

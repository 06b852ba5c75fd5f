use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tokio::io::AsyncRead;
use url::Url;

/// Boxed in-memory reader for a file payload.
pub type PayloadReader = Box<dyn AsyncRead + Send + Unpin>;

/// An in-memory payload that can be read exactly once.
#[derive(Clone, Default)]
pub struct ReaderSource(Arc<Mutex<Option<PayloadReader>>>);

impl ReaderSource {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(reader)))))
    }

    /// Take the reader out. Later calls return `None`.
    pub fn take(&self) -> Option<PayloadReader> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for ReaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let taken = self
            .0
            .lock()
            .map(|r| r.is_none())
            .unwrap_or(true);
        f.debug_struct("ReaderSource").field("taken", &taken).finish()
    }
}

/// Where the bytes of a file entity come from.
#[derive(Clone, Debug)]
pub enum FileSource {
    Path(PathBuf),
    Reader(ReaderSource),
    Remote(Url),
}

/// Shape of a crate entity.
#[derive(Clone, Debug)]
pub enum EntityKind {
    RootDataset,
    /// A data entity with an optional payload. Remote payloads are only
    /// packaged when `fetch_remote` is set.
    File {
        source: Option<FileSource>,
        fetch_remote: bool,
    },
    /// A reference to another crate, addressed by its remote URL.
    Dataset,
    Person,
    Contextual,
}

/// One entity of the crate graph.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: String,
    pub types: Vec<String>,
    pub kind: EntityKind,
    pub properties: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, types: Vec<String>) -> Self {
        Self {
            id: id.into(),
            types,
            kind,
            properties: Map::new(),
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.shift_remove(key)
    }

    /// Append `value` to a property, turning a single value into a list.
    pub fn append_to(&mut self, key: &str, value: Value) {
        match self.properties.get_mut(key) {
            None => {
                self.properties.insert(key.to_string(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        }
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }

    /// Data entities are the files and datasets of the crate.
    pub fn is_data_entity(&self) -> bool {
        matches!(self.kind, EntityKind::File { .. } | EntityKind::Dataset)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    /// JSON-LD node with `@id` and `@type` first.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("@id".into(), Value::String(self.id.clone()));
        let types = match self.types.as_slice() {
            [single] => Value::String(single.clone()),
            many => Value::Array(many.iter().cloned().map(Value::String).collect()),
        };
        map.insert("@type".into(), types);
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

use cwr_types::{LinkedObject, ObjectId, TypeError};
use indexmap::IndexMap;
use serde_json::Value;

/// Resolved objects keyed by identifier, in discovery order.
///
/// The root comes first, followed by the nodes of the server-side expansion
/// and then every batch round in identifier order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
    root: ObjectId,
    objects: IndexMap<ObjectId, Value>,
}

impl ResolvedGraph {
    pub(crate) fn new(root: ObjectId) -> Self {
        Self {
            root,
            objects: IndexMap::new(),
        }
    }

    /// Build a graph from already-resolved nodes. Each node must carry `@id`.
    pub fn from_nodes(root: ObjectId, nodes: impl IntoIterator<Item = Value>) -> Self {
        let mut graph = Self::new(root);
        for node in nodes {
            if let Some(id) = node.get("@id").and_then(Value::as_str) {
                let id = ObjectId::new(id);
                graph.insert(id, node);
            }
        }
        graph
    }

    pub(crate) fn insert(&mut self, id: ObjectId, node: Value) -> bool {
        if self.objects.contains_key(&id) {
            return false;
        }
        self.objects.insert(id, node);
        true
    }

    pub fn root(&self) -> &ObjectId {
        &self.root
    }

    pub fn root_object(&self) -> Option<&Value> {
        self.objects.get(&self.root)
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Value)> {
        self.objects.iter()
    }

    /// The raw JSON nodes, cloned, in discovery order.
    pub fn nodes(&self) -> Vec<Value> {
        self.objects.values().cloned().collect()
    }

    pub fn linked_objects(&self) -> Result<Vec<LinkedObject>, TypeError> {
        self.objects
            .values()
            .cloned()
            .map(LinkedObject::from_json)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_nodes_keeps_first_occurrence() {
        let graph = ResolvedGraph::from_nodes(
            ObjectId::new("cwr/r"),
            vec![
                json!({"@id": "cwr/r", "name": "first"}),
                json!({"@id": "cwr/r", "name": "second"}),
                json!({"name": "anonymous"}),
                json!({"@id": "cwr/a"}),
            ],
        );
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.root_object().unwrap()["name"], "first");
        let ids: Vec<&str> = graph.ids().map(ObjectId::as_str).collect();
        assert_eq!(ids, vec!["cwr/r", "cwr/a"]);
    }

    #[test]
    fn linked_objects_convert() {
        let graph = ResolvedGraph::from_nodes(
            ObjectId::new("cwr/r"),
            vec![json!({"@id": "cwr/r", "@type": "Dataset"})],
        );
        let objects = graph.linked_objects().unwrap();
        assert_eq!(objects[0].types, vec!["Dataset"]);
    }
}

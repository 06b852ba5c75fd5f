use std::collections::BTreeMap;
use std::iter;

use cwr_jsonld::context::is_absolute_iri;
use cwr_jsonld::RO_CRATE_CONTEXT;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::entity::{Entity, EntityKind};
use crate::error::CrateResult;
use crate::preview;
use crate::profile::Profiles;

/// Name of the metadata document inside a crate.
pub const METADATA_FILE: &str = "ro-crate-metadata.json";

/// Name of the human-readable preview inside a crate.
pub const PREVIEW_FILE: &str = "ro-crate-preview.html";

/// Root identifier of an attached crate.
pub const ATTACHED_ROOT: &str = "./";

/// An RO-Crate under construction.
///
/// Entities live in an insertion-ordered arena keyed by their crate-local
/// identifier; links between them are `{"@id": ...}` references, never
/// nested objects. The metadata descriptor is generated on output.
#[derive(Debug)]
pub struct RoCrate {
    root: Entity,
    entities: IndexMap<String, Entity>,
    profiles: Profiles,
    id_map: BTreeMap<String, String>,
    with_preview: bool,
}

impl RoCrate {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root: Entity::new(root_id, EntityKind::RootDataset, vec!["Dataset".into()]),
            entities: IndexMap::new(),
            profiles: Profiles::base(),
            id_map: BTreeMap::new(),
            with_preview: false,
        }
    }

    /// An attached crate rooted at `./`.
    pub fn attached() -> Self {
        Self::new(ATTACHED_ROOT)
    }

    pub fn root_id(&self) -> &str {
        &self.root.id
    }

    pub fn root(&self) -> &Entity {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Entity {
        &mut self.root
    }

    /// Detached crates are addressed by a remote URL instead of `./`.
    pub fn is_detached(&self) -> bool {
        self.root.id != ATTACHED_ROOT
    }

    /// Insert an entity. An entity with the same identifier is replaced in
    /// place.
    pub fn add(&mut self, entity: Entity) -> &mut Entity {
        let id = entity.id.clone();
        if id == self.root.id {
            tracing::warn!(%id, "refusing to replace the root dataset");
            return &mut self.root;
        }
        let (index, _) = self.entities.insert_full(id, entity);
        &mut self.entities[index]
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        if id == self.root.id {
            return Some(&self.root);
        }
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        if id == self.root.id {
            return Some(&mut self.root);
        }
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.shift_remove(id)
    }

    /// Root first, then every other entity in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        iter::once(&self.root).chain(self.entities.values())
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        iter::once(&mut self.root).chain(self.entities.values_mut())
    }

    pub fn data_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_data_entity())
    }

    pub fn files(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::File { .. }))
    }

    /// Number of nodes in the metadata graph, descriptor and root included.
    pub fn node_count(&self) -> usize {
        self.entities.len() + 2
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    pub fn profiles_mut(&mut self) -> &mut Profiles {
        &mut self.profiles
    }

    /// Record that source object `internal` became entity `local`.
    pub fn map_id(&mut self, internal: impl Into<String>, local: impl Into<String>) {
        self.id_map.insert(internal.into(), local.into());
    }

    pub fn local_id(&self, internal: &str) -> Option<&str> {
        self.id_map.get(internal).map(String::as_str)
    }

    pub fn id_map(&self) -> &BTreeMap<String, String> {
        &self.id_map
    }

    pub fn set_preview(&mut self, with_preview: bool) {
        self.with_preview = with_preview;
    }

    pub fn has_preview(&self) -> bool {
        self.with_preview
    }

    pub fn main_entity(&self) -> Option<&str> {
        self.root.get("mainEntity").and_then(cwr_types::reference_id)
    }

    /// The `@context` of the metadata document.
    pub fn context(&self) -> Value {
        if self.profiles.contexts.is_empty() {
            return Value::String(RO_CRATE_CONTEXT.to_string());
        }
        let mut contexts = vec![Value::String(RO_CRATE_CONTEXT.to_string())];
        contexts.extend(self.profiles.contexts.iter().cloned().map(Value::String));
        Value::Array(contexts)
    }

    fn descriptor(&self) -> Value {
        let conforms: Vec<Value> = self
            .profiles
            .descriptor
            .iter()
            .map(|p| json!({ "@id": p }))
            .collect();
        let conforms_to = match conforms.as_slice() {
            [single] => single.clone(),
            _ => Value::Array(conforms),
        };
        json!({
            "@id": METADATA_FILE,
            "@type": "CreativeWork",
            "about": {"@id": self.root.id},
            "conformsTo": conforms_to,
        })
    }

    /// The `ro-crate-metadata.json` document.
    pub fn metadata_document(&self) -> Value {
        let mut graph = vec![self.descriptor()];
        graph.extend(self.entities().map(Entity::to_json));
        let mut doc = Map::new();
        doc.insert("@context".into(), self.context());
        doc.insert("@graph".into(), Value::Array(graph));
        Value::Object(doc)
    }

    /// The `ro-crate-preview.html` page, if the crate was built with one.
    pub fn preview_html(&self) -> CrateResult<Option<String>> {
        if !self.with_preview {
            return Ok(None);
        }
        Ok(Some(preview::render(self)?))
    }

    /// References whose target is neither an entity of this crate nor an
    /// absolute IRI, as `(entity, target)` pairs.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for entity in self.entities() {
            for value in entity.properties.values() {
                let mut targets = Vec::new();
                collect_reference_targets(value, &mut targets);
                for target in targets {
                    if !self.resolves(target) {
                        dangling.push((entity.id.clone(), target.to_string()));
                    }
                }
            }
        }
        dangling
    }

    /// Whether a reference to `target` is satisfied by this crate.
    pub fn resolves(&self, target: &str) -> bool {
        target == METADATA_FILE || self.contains(target) || is_absolute_iri(target)
    }
}

fn collect_reference_targets<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_reference_targets(v, out)),
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("@id") {
                out.push(id);
            }
            for (key, v) in map {
                if !key.starts_with('@') {
                    collect_reference_targets(v, out);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{RO_CRATE_PROFILE, WORKFLOW_RUN_TERMS};

    fn file(id: &str) -> Entity {
        Entity::new(
            id,
            EntityKind::File {
                source: None,
                fetch_remote: false,
            },
            vec!["File".into()],
        )
    }

    #[test]
    fn metadata_document_lists_descriptor_root_and_entities() {
        let mut c = RoCrate::attached();
        c.add(file("a.csv"));
        c.add(Entity::new("#p", EntityKind::Contextual, vec!["Thing".into()]));
        let doc = c.metadata_document();
        assert_eq!(doc["@context"], RO_CRATE_CONTEXT);
        let graph = doc["@graph"].as_array().unwrap();
        let ids: Vec<&str> = graph.iter().map(|n| n["@id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![METADATA_FILE, "./", "a.csv", "#p"]);
        assert_eq!(graph[0]["about"], json!({"@id": "./"}));
        assert_eq!(graph[0]["conformsTo"], json!({"@id": RO_CRATE_PROFILE}));
        assert_eq!(c.node_count(), 4);
    }

    #[test]
    fn extra_contexts_turn_context_into_list() {
        let mut c = RoCrate::attached();
        c.profiles_mut().contexts.push(WORKFLOW_RUN_TERMS.into());
        assert_eq!(c.context(), json!([RO_CRATE_CONTEXT, WORKFLOW_RUN_TERMS]));
    }

    #[test]
    fn replacing_keeps_position() {
        let mut c = RoCrate::attached();
        c.add(file("a"));
        c.add(file("b"));
        let mut replacement = file("a");
        replacement.set("name", json!("A"));
        c.add(replacement);
        let ids: Vec<&str> = c.entities().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["./", "a", "b"]);
        assert_eq!(c.get("a").unwrap().name(), Some("A"));
    }

    #[test]
    fn dangling_references_are_reported() {
        let mut c = RoCrate::attached();
        c.add(file("a"));
        c.root_mut().set(
            "hasPart",
            json!([{"@id": "a"}, {"@id": "missing"}, {"@id": "https://spdx.org/licenses/MIT"}]),
        );
        assert_eq!(
            c.dangling_references(),
            vec![("./".to_string(), "missing".to_string())]
        );
    }

    #[test]
    fn preview_only_when_requested() {
        let mut c = RoCrate::attached();
        assert!(c.preview_html().unwrap().is_none());
        c.root_mut().set("name", json!("Lathyrus vestitus"));
        c.set_preview(true);
        let html = c.preview_html().unwrap().unwrap();
        assert!(html.contains("Lathyrus vestitus"));
    }
}

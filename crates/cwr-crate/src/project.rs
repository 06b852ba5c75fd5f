use std::collections::{BTreeMap, HashSet};

use cwr_jsonld::FlattenedGraph;
use cwr_types::{
    as_list, reference, string_or_reference, type_tags, unwrap_value, ObjectId, ObjectType,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::entity::{Entity, EntityKind, FileSource};
use crate::error::{CrateError, CrateResult};
use crate::model::RoCrate;
use crate::profile::{
    profile_version, RO_CRATE_GENERIC, WORKFLOW_RO_CRATE_PROFILE, WORKFLOW_RUN_PROFILES,
    WORKFLOW_RUN_TERMS,
};
use crate::prune::prune_for_workflow;
use crate::remote::RemoteUrls;

/// Properties the repository uses for its own bookkeeping.
const BOOKKEEPING: [&str; 4] = ["contentUrl", "isPartOf", "partOf", "resultOf"];

/// Graph-structure keys of a node that are never copied as properties.
const RESERVED: [&str; 3] = ["@context", "@id", "@type"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProjectOptions {
    /// Render `ro-crate-preview.html` along with the metadata.
    pub with_preview: bool,
    /// Address the crate and its data entities by remote URL.
    pub detached: bool,
    /// Reduce the crate to the dataset's workflow.
    pub workflow_only: bool,
}

impl ProjectOptions {
    pub fn attached() -> Self {
        Self::default()
    }

    pub fn detached() -> Self {
        Self {
            detached: true,
            ..Self::default()
        }
    }

    pub fn with_preview(mut self) -> Self {
        self.with_preview = true;
        self
    }

    pub fn workflow_only(mut self) -> Self {
        self.workflow_only = true;
        self
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn node_id(node: &Map<String, Value>) -> Option<&str> {
    node.get("@id").and_then(Value::as_str)
}

fn strip_bookkeeping(properties: &mut Map<String, Value>) {
    for key in BOOKKEEPING {
        properties.shift_remove(key);
    }
}

/// Substitute the name for a missing or empty description.
fn ensure_description(entity: &mut Entity) {
    let has_description = entity
        .get("description")
        .is_some_and(|d| !matches!(d, Value::Null) && d.as_str() != Some(""));
    if has_description {
        return;
    }
    if let Some(name) = entity.get("name").cloned() {
        entity.set("description", name);
    }
}

/// Project a flattened dataset graph into an RO-Crate.
///
/// The root node becomes the root dataset (`./`, or its remote URL when
/// detached); every other node is classified by type into a person, file,
/// child-crate reference or contextual entity. References between nodes are
/// then rewritten from repository identifiers to crate identifiers, and the
/// conformance profiles matching the crate's content are declared.
pub fn project(
    root: &ObjectId,
    graph: &FlattenedGraph,
    remote_urls: &RemoteUrls,
    options: ProjectOptions,
) -> CrateResult<RoCrate> {
    let mut nodes = graph.nodes.clone();
    if options.workflow_only {
        prune_for_workflow(&mut nodes, root)?;
    }
    let root_node = nodes
        .iter()
        .find(|n| node_id(n) == Some(root.as_str()))
        .cloned()
        .ok_or_else(|| CrateError::RootMissing(root.clone()))?;

    let root_url = remote_urls.get(root.as_str());
    let mut krate = if options.detached {
        let url = root_url.ok_or_else(|| CrateError::MissingRemoteUrl {
            id: root.to_string(),
            role: "root dataset",
        })?;
        RoCrate::new(with_trailing_slash(url))
    } else {
        let mut krate = RoCrate::attached();
        if let Some(url) = root_url {
            krate.root_mut().set("sameAs", reference(url));
        }
        krate
    };
    krate.set_preview(options.with_preview);
    let root_local = krate.root_id().to_string();
    krate.map_id(root.as_str(), root_local);

    let projection = Projection {
        remote_urls,
        detached: options.detached,
    };
    for node in &nodes {
        match node_id(node) {
            Some(id) if id != root.as_str() => {
                let entity = projection.entity(id, node.clone())?;
                krate.map_id(id, entity.id.clone());
                krate.add(entity);
            }
            _ => {}
        }
    }

    projection.copy_root(&mut krate, root_node)?;
    rewrite_references(&mut krate);

    if let Some((entity, target)) = krate.dangling_references().into_iter().next() {
        error!(%entity, %target, "dangling reference after rewrite");
        return Err(CrateError::DanglingReference { entity, target });
    }

    declare_profiles(&mut krate);
    info!(
        root = %root,
        crate_root = krate.root_id(),
        entities = krate.node_count(),
        detached = options.detached,
        workflow_only = options.workflow_only,
        "projected crate"
    );
    Ok(krate)
}

struct Projection<'a> {
    remote_urls: &'a RemoteUrls,
    detached: bool,
}

impl Projection<'_> {
    fn remote_url(&self, id: &str) -> Option<&str> {
        self.remote_urls.get(id).map(String::as_str)
    }

    fn require_url(&self, id: &str, role: &'static str) -> CrateResult<&str> {
        self.remote_url(id).ok_or_else(|| CrateError::MissingRemoteUrl {
            id: id.to_string(),
            role,
        })
    }

    /// Classify one non-root node and build its entity.
    fn entity(&self, internal_id: &str, mut properties: Map<String, Value>) -> CrateResult<Entity> {
        properties.shift_remove("@id");
        let types = type_tags(properties.shift_remove("@type").as_ref());
        let remote_url = self.remote_url(internal_id);
        if let (Some(url), false) = (remote_url, self.detached) {
            properties.insert("sameAs".into(), reference(url));
        }

        let kind = ObjectType::classify(&types);
        debug!(id = internal_id, kind = ?kind, "classifying node");
        let entity = match kind {
            ObjectType::Person => {
                let id = take_identifier(&mut properties).unwrap_or_else(|| internal_id.to_string());
                Entity::new(id, EntityKind::Person, types).with_properties(properties)
            }
            ObjectType::File => self.file(internal_id, types, properties)?,
            ObjectType::Dataset => {
                for value in properties.values_mut() {
                    *value = unwrap_value(value.take());
                }
                strip_bookkeeping(&mut properties);
                let url = with_trailing_slash(self.require_url(internal_id, "dataset")?);
                let mut entity =
                    Entity::new(url, EntityKind::Dataset, types).with_properties(properties);
                entity.append_to("conformsTo", reference(RO_CRATE_GENERIC));
                ensure_description(&mut entity);
                entity
            }
            ObjectType::Action | ObjectType::Other(_) => {
                let id = take_identifier(&mut properties)
                    .unwrap_or_else(|| format!("#{internal_id}"));
                Entity::new(id, EntityKind::Contextual, types).with_properties(properties)
            }
        };
        Ok(entity)
    }

    fn file(
        &self,
        internal_id: &str,
        types: Vec<String>,
        mut properties: Map<String, Value>,
    ) -> CrateResult<Entity> {
        let content_location = properties
            .get("contentUrl")
            .and_then(string_or_reference)
            .map(str::to_string);
        strip_bookkeeping(&mut properties);

        let remote_url = self.remote_url(internal_id);
        let source = remote_url
            .and_then(|u| Url::parse(u).ok())
            .map(FileSource::Remote);

        if self.detached {
            let url = self.require_url(internal_id, "file")?;
            let kind = EntityKind::File {
                source,
                fetch_remote: false,
            };
            return Ok(Entity::new(url, kind, types).with_properties(properties));
        }

        let id = match (content_location, remote_url) {
            (Some(location), _) => location,
            (None, Some(url)) => {
                local_name(url).unwrap_or_else(|| internal_id.replace('/', "_"))
            }
            (None, None) => {
                return Err(CrateError::MissingRemoteUrl {
                    id: internal_id.to_string(),
                    role: "file",
                })
            }
        };
        if let Some(url) = remote_url {
            properties.insert("contentUrl".into(), Value::String(url.to_string()));
        }
        let kind = EntityKind::File {
            source,
            fetch_remote: true,
        };
        Ok(Entity::new(id, kind, types).with_properties(properties))
    }

    /// Copy the root node's properties onto the root dataset.
    fn copy_root(&self, krate: &mut RoCrate, root_node: Map<String, Value>) -> CrateResult<()> {
        let mut parents = Vec::new();
        for (key, value) in root_node {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            if key == "isPartOf" {
                parents.extend(
                    as_list(&value)
                        .into_iter()
                        .filter_map(string_or_reference)
                        .map(str::to_string),
                );
                continue;
            }
            krate.root_mut().set(key, unwrap_value(value));
        }

        let mut parent_refs = Vec::new();
        let mut excluded = HashSet::new();
        for parent in parents {
            let Some(url) = self.remote_url(&parent) else {
                if self.detached {
                    return Err(CrateError::MissingRemoteUrl {
                        id: parent,
                        role: "parent dataset",
                    });
                }
                warn!(%parent, "parent dataset has no remote URL, leaving it out");
                continue;
            };
            let id = with_trailing_slash(url);
            let mut entity = Entity::new(id.clone(), EntityKind::Dataset, vec!["Dataset".into()]);
            entity.set("conformsTo", reference(RO_CRATE_GENERIC));
            krate.add(entity);
            krate.map_id(parent.as_str(), id.clone());
            excluded.insert(parent);
            excluded.insert(id.clone());
            parent_refs.push(id);
        }

        let root = krate.root_mut();
        match parent_refs.as_slice() {
            [] => {}
            [single] => root.set("isPartOf", reference(single)),
            many => root.set(
                "isPartOf",
                Value::Array(many.iter().map(reference).collect()),
            ),
        }
        // A parent is linked through isPartOf, never as a part.
        if !excluded.is_empty() {
            if let Some(parts) = root.remove("hasPart") {
                let kept: Vec<Value> = as_list(&parts)
                    .into_iter()
                    .filter(|p| string_or_reference(p).map_or(true, |id| !excluded.contains(id)))
                    .cloned()
                    .collect();
                root.set("hasPart", Value::Array(kept));
            }
        }
        ensure_description(root);
        Ok(())
    }
}

/// In-crate path for a file known only by URL: the named payload, else the
/// last path segment.
fn local_name(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    if let Some((_, name)) = url.query_pairs().find(|(key, _)| key == "payload") {
        return Some(name.into_owned()).filter(|n| !n.is_empty());
    }
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

fn take_identifier(properties: &mut Map<String, Value>) -> Option<String> {
    let value = properties.shift_remove("identifier")?;
    string_or_reference(&value).map(str::to_string)
}

/// Rewrite every reference from repository identifiers to crate
/// identifiers. Bare identifier strings are turned back into reference
/// objects. References without a crate counterpart are left as they are
/// for the dangling check to report.
fn rewrite_references(krate: &mut RoCrate) {
    let id_map = krate.id_map().clone();
    for entity in krate.entities_mut() {
        for (key, value) in entity.properties.iter_mut() {
            if !key.starts_with('@') && key != "sameAs" {
                rewrite(&id_map, value);
            }
        }
    }
}

fn rewrite(id_map: &BTreeMap<String, String>, value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(local) = id_map.get(s.as_str()) {
                *value = reference(local);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| rewrite(id_map, item)),
        Value::Object(map) => {
            if let Some(id) = map.get("@id").and_then(Value::as_str) {
                if let Some(local) = id_map.get(id) {
                    let local = Value::String(local.clone());
                    map.insert("@id".into(), local);
                }
                return;
            }
            for (key, v) in map.iter_mut() {
                if !key.starts_with('@') {
                    rewrite(id_map, v);
                }
            }
        }
        _ => {}
    }
}

/// Declare the profiles matching the crate's content.
fn declare_profiles(krate: &mut RoCrate) {
    if krate.main_entity().is_none() {
        return;
    }
    let profiles = krate.profiles_mut();
    profiles.descriptor.push(WORKFLOW_RO_CRATE_PROFILE.to_string());
    profiles.contexts.push(WORKFLOW_RUN_TERMS.to_string());

    if !krate.root().properties.contains_key("mentions") {
        return;
    }
    for profile in WORKFLOW_RUN_PROFILES {
        let mut entity = Entity::new(profile, EntityKind::Contextual, vec!["CreativeWork".into()]);
        entity.set("version", json!(profile_version(profile)));
        krate.add(entity);
        krate.root_mut().append_to("conformsTo", reference(profile));
        krate.profiles_mut().entities.push(profile.to_string());
    }
}

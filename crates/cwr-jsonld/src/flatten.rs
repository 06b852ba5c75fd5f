use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::compact::Compactor;
use crate::context::{is_absolute_iri, ActiveContext, Documents};
use crate::error::JsonLdResult;
use crate::expand::expand;
use crate::loader::DocumentLoader;
use crate::node_map::NodeMap;

/// Context of RO-Crate 1.1 metadata documents.
pub const RO_CRATE_CONTEXT: &str = "https://w3id.org/ro/crate/1.1/context";

/// Terms of the workflow-run RO-Crate profiles.
pub const WORKFLOW_RUN_CONTEXT: &str =
    "https://www.researchobject.org/ro-terms/workflow-run/context.jsonld";

const SECURE_SCHEMA: &str = "https://schema.org";
const PLAIN_SCHEMA: &str = "http://schema.org";

/// Rewrite `https://schema.org...` to `http://schema.org...` inside an
/// object's `@context`. Data values are left alone.
pub fn rewrite_secure_vocab(object: &mut Value) {
    if let Value::Object(map) = object {
        if let Some(context) = map.get_mut("@context") {
            rewrite_strings(context);
        }
    }
}

fn rewrite_strings(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(rest) = s.strip_prefix(SECURE_SCHEMA) {
                *s = format!("{PLAIN_SCHEMA}{rest}");
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_strings),
        Value::Object(map) => map.values_mut().for_each(rewrite_strings),
        _ => {}
    }
}

#[derive(Debug, Clone)]
pub struct FlattenOptions {
    /// Rewrite the secure schema.org vocabulary host before flattening.
    pub rewrite_secure_schema: bool,
    /// Base IRI used for relative identifiers.
    pub base: Option<String>,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            rewrite_secure_schema: true,
            base: None,
        }
    }
}

/// Flattened nodes plus the context they were compacted against.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedGraph {
    pub context: Value,
    pub nodes: Vec<Map<String, Value>>,
}

impl FlattenedGraph {
    pub fn node(&self, id: &str) -> Option<&Map<String, Value>> {
        self.nodes
            .iter()
            .find(|n| n.get("@id").and_then(Value::as_str) == Some(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter_map(|n| n.get("@id").and_then(Value::as_str))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("@context".into(), self.context.clone());
        doc.insert(
            "@graph".into(),
            Value::Array(self.nodes.iter().cloned().map(Value::Object).collect()),
        );
        Value::Object(doc)
    }
}

/// Flattens linked objects with mixed contexts into one node list under a
/// set of target contexts.
///
/// Remote contexts are dereferenced through the configured loader; wrap it
/// in a [`CachingDocumentLoader`](crate::CachingDocumentLoader) to share
/// fetched contexts between calls.
pub struct Flattener {
    loader: Arc<dyn DocumentLoader>,
    options: FlattenOptions,
}

impl std::fmt::Debug for Flattener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flattener")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Flattener {
    pub fn new(loader: Arc<dyn DocumentLoader>) -> Self {
        Self::with_options(loader, FlattenOptions::default())
    }

    pub fn with_options(loader: Arc<dyn DocumentLoader>, options: FlattenOptions) -> Self {
        Self { loader, options }
    }

    pub fn options(&self) -> &FlattenOptions {
        &self.options
    }

    /// Flatten `objects` and compact the result against `targets`.
    ///
    /// Any context that cannot be dereferenced fails the whole call.
    pub async fn flatten(&self, objects: &[Value], targets: &[&str]) -> JsonLdResult<FlattenedGraph> {
        let mut objects = objects.to_vec();
        if self.options.rewrite_secure_schema {
            objects.iter_mut().for_each(rewrite_secure_vocab);
        }

        let mut pending = BTreeSet::new();
        for object in &objects {
            collect_context_urls(object, false, &mut pending);
        }
        pending.extend(targets.iter().map(|t| t.to_string()));
        let documents = self.load_contexts(pending).await?;

        let initial = ActiveContext::new(self.options.base.clone());
        let mut node_map = NodeMap::new();
        for object in &objects {
            for expanded in expand(object, &initial, &documents)? {
                node_map.add(&expanded);
            }
        }

        let target_context = match targets {
            [single] => Value::String(single.to_string()),
            many => Value::Array(many.iter().map(|t| Value::String(t.to_string())).collect()),
        };
        let active = initial.process(&target_context, &documents)?;
        let compactor = Compactor::new(&active);
        let nodes: Vec<_> = node_map
            .into_flattened()
            .iter()
            .map(|node| compactor.compact_node(node))
            .collect();

        info!(
            objects = objects.len(),
            nodes = nodes.len(),
            contexts = documents.len(),
            "flattened linked objects"
        );
        Ok(FlattenedGraph {
            context: target_context,
            nodes,
        })
    }

    /// Load every context URL, following contexts that import further URLs.
    async fn load_contexts(&self, mut pending: BTreeSet<String>) -> JsonLdResult<Documents> {
        let mut documents = Documents::new();
        while let Some(url) = pending.pop_first() {
            if documents.contains_key(&url) {
                continue;
            }
            debug!(%url, "dereferencing context");
            let remote = self.loader.load(&url).await?;
            let mut context = remote.context();
            if self.options.rewrite_secure_schema {
                rewrite_strings(&mut context);
            }
            let mut nested = BTreeSet::new();
            collect_context_urls(&context, true, &mut nested);
            pending.extend(nested.into_iter().filter(|u| !documents.contains_key(u)));
            documents.insert(url, context);
        }
        Ok(documents)
    }
}

/// Collect absolute context URLs. `in_context` marks that `value` is itself
/// a context value rather than a document.
fn collect_context_urls(value: &Value, in_context: bool, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) if in_context && is_absolute_iri(s) => {
            out.insert(s.clone());
        }
        Value::Array(items) => {
            for item in items {
                collect_context_urls(item, in_context, out);
            }
        }
        Value::Object(map) => {
            for (key, v) in map {
                if key == "@context" {
                    collect_context_urls(v, true, out);
                } else if !in_context {
                    collect_context_urls(v, false, out);
                } else if let Value::Object(definition) = v {
                    // Scoped contexts inside term definitions.
                    if let Some(scoped) = definition.get("@context") {
                        collect_context_urls(scoped, true, out);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticDocumentLoader;
    use serde_json::json;

    fn crate_context() -> Value {
        json!({"@context": {
            "@vocab": "http://schema.org/",
            "Dataset": "http://schema.org/Dataset",
            "File": "http://schema.org/MediaObject",
            "Person": "http://schema.org/Person",
            "name": "http://schema.org/name",
            "author": "http://schema.org/author",
            "hasPart": "http://schema.org/hasPart",
            "contentUrl": "http://schema.org/contentUrl"
        }})
    }

    fn loader() -> Arc<StaticDocumentLoader> {
        Arc::new(
            StaticDocumentLoader::new()
                .with_document(RO_CRATE_CONTEXT, crate_context())
                .with_document(
                    "http://schema.org",
                    json!({"@context": {"@vocab": "http://schema.org/"}}),
                ),
        )
    }

    #[test]
    fn rewrites_only_context_strings() {
        let mut object = json!({
            "@context": ["https://schema.org", {"x": "https://schema.org/x"}],
            "url": "https://schema.org/keep"
        });
        rewrite_secure_vocab(&mut object);
        assert_eq!(object["@context"][0], "http://schema.org");
        assert_eq!(object["@context"][1]["x"], "http://schema.org/x");
        assert_eq!(object["url"], "https://schema.org/keep");
    }

    #[tokio::test]
    async fn flattens_store_objects_into_crate_terms() {
        let loader = loader();
        let flattener = Flattener::new(loader.clone());
        let objects = vec![
            json!({
                "@context": "https://schema.org",
                "@id": "cwr/ds",
                "@type": "Dataset",
                "name": "Data",
                "author": {"@id": "cwr/p", "@type": "Person", "name": "Ada"},
                "hasPart": [{"@id": "cwr/f"}]
            }),
            json!({
                "@context": "https://schema.org",
                "@id": "cwr/f",
                "@type": "MediaObject",
                "contentUrl": "data.csv"
            }),
        ];
        let graph = flattener.flatten(&objects, &[RO_CRATE_CONTEXT]).await.unwrap();

        assert_eq!(graph.context, json!(RO_CRATE_CONTEXT));
        assert_eq!(graph.ids().collect::<Vec<_>>(), vec!["cwr/ds", "cwr/f", "cwr/p"]);
        let ds = graph.node("cwr/ds").unwrap();
        assert_eq!(ds["@type"], "Dataset");
        assert_eq!(ds["author"], json!({"@id": "cwr/p"}));
        assert_eq!(ds["hasPart"], json!({"@id": "cwr/f"}));
        assert_eq!(graph.node("cwr/f").unwrap()["@type"], "File");
        assert_eq!(graph.node("cwr/p").unwrap()["name"], "Ada");
        // https://schema.org was requested as http://schema.org.
        assert_eq!(loader.loads(), 2);
    }

    #[tokio::test]
    async fn missing_context_fails_the_call() {
        let flattener = Flattener::new(loader());
        let objects = vec![json!({"@context": "https://unknown.org/ctx", "@id": "cwr/a"})];
        assert!(flattener.flatten(&objects, &[RO_CRATE_CONTEXT]).await.is_err());
    }

    #[test]
    fn context_urls_are_collected_from_nested_objects() {
        let mut out = BTreeSet::new();
        collect_context_urls(
            &json!({
                "@context": ["http://a.org/ctx", {"t": {"@id": "x:t", "@context": "http://b.org/ctx"}}],
                "nested": {"@context": "http://c.org/ctx"},
                "value": "http://not-a-context.org"
            }),
            false,
            &mut out,
        );
        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            vec!["http://a.org/ctx", "http://b.org/ctx", "http://c.org/ctx"]
        );
    }
}

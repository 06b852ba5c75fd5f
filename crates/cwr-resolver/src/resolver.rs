use std::collections::BTreeSet;
use std::sync::Arc;

use cwr_store::{ObjectStore, MAX_BATCH_SIZE};
use cwr_types::ObjectId;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::{CacheKey, GraphCache};
use crate::error::{ResolveError, ResolveResult};
use crate::graph::ResolvedGraph;
use crate::options::{ResolveOptions, ResolveStrategy};
use crate::scan::collect_references;

/// Resolves the transitive closure of objects reachable from a root.
pub struct Resolver {
    store: Arc<dyn ObjectStore>,
    cache: Option<GraphCache>,
    batch_size: usize,
}

impl Resolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            cache: None,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    pub fn with_cache(mut self, cache: GraphCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Identifiers per batch search call. Clamped to the store limit.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Resolve the graph rooted at `root`.
    pub async fn resolve(
        &self,
        root: &ObjectId,
        options: ResolveOptions,
    ) -> ResolveResult<Arc<ResolvedGraph>> {
        let key = CacheKey::new(root, &options);
        if let Some(cache) = &self.cache {
            if let Some(graph) = cache.get(&key).await {
                debug!(root = %root, "resolved graph cache hit");
                return Ok(graph);
            }
            debug!(root = %root, "resolved graph cache miss");
        }

        let graph = Arc::new(self.resolve_uncached(root, &options).await?);

        if let Some(cache) = &self.cache {
            cache.insert(key, Arc::clone(&graph)).await;
        }
        Ok(graph)
    }

    async fn resolve_uncached(
        &self,
        root: &ObjectId,
        options: &ResolveOptions,
    ) -> ResolveResult<ResolvedGraph> {
        let prefix = self.store.prefix().clone();
        let mut graph = ResolvedGraph::new(root.clone());
        let mut requested: BTreeSet<ObjectId> = BTreeSet::new();

        let first_level = match options.strategy {
            ResolveStrategy::GraphExpansion => {
                self.store
                    .object_graph(root, options.graph_method())
                    .await?
            }
            ResolveStrategy::BatchWalk => {
                requested.insert(root.clone());
                self.fetch(&[root.clone()]).await?
            }
        };

        let mut fresh = Vec::with_capacity(first_level.len());
        for node in first_level {
            match node.get("@id").and_then(Value::as_str) {
                Some(id) => {
                    let id = ObjectId::new(id);
                    if graph.insert(id, node.clone()) {
                        fresh.push(node);
                    }
                }
                None => warn!(root = %root, "skipping graph node without @id"),
            }
        }
        if !graph.contains(root.as_str()) {
            return Err(ResolveError::RootMissing(root.clone()));
        }
        debug!(root = %root, nodes = graph.len(), "initial graph fetched");

        let mut pending = discover(&fresh, &prefix, &graph, &requested);
        for round in 0..options.max_depth {
            if pending.is_empty() {
                break;
            }
            let batch: Vec<ObjectId> = pending.into_iter().collect();
            requested.extend(batch.iter().cloned());
            debug!(root = %root, round, references = batch.len(), "resolving references");

            let found = self.fetch(&batch).await?;
            fresh.clear();
            for node in found {
                if let Some(id) = node.get("@id").and_then(Value::as_str) {
                    if graph.insert(ObjectId::new(id), node.clone()) {
                        fresh.push(node);
                    }
                }
            }
            for id in &batch {
                if !graph.contains(id.as_str()) {
                    warn!(root = %root, object_id = %id, "reference not returned by the store");
                }
            }
            pending = discover(&fresh, &prefix, &graph, &requested);
        }

        if !pending.is_empty() {
            error!(
                root = %root,
                max_depth = options.max_depth,
                unresolved = pending.len(),
                "maximum recursion depth reached while resolving objects"
            );
            return Err(ResolveError::DepthExceeded {
                root: root.clone(),
                max_depth: options.max_depth,
                unresolved: pending.len(),
            });
        }
        Ok(graph)
    }

    /// Batch search in chunks no larger than the configured batch size.
    /// Returned contents get their `@id` set from the search hit.
    async fn fetch(&self, ids: &[ObjectId]) -> ResolveResult<Vec<Value>> {
        let mut nodes = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.batch_size) {
            for hit in self.store.search_ids(chunk).await? {
                let mut content = hit.content;
                if let Value::Object(map) = &mut content {
                    map.insert("@id".into(), Value::String(hit.id.into_string()));
                }
                nodes.push(content);
            }
        }
        Ok(nodes)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("batch_size", &self.batch_size)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

fn discover(
    nodes: &[Value],
    prefix: &cwr_types::IdPrefix,
    graph: &ResolvedGraph,
    requested: &BTreeSet<ObjectId>,
) -> BTreeSet<ObjectId> {
    let mut found = BTreeSet::new();
    for node in nodes {
        collect_references(node, prefix, &mut found);
    }
    found.retain(|id| !graph.contains(id.as_str()) && !requested.contains(id));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwr_store::InMemoryObjectStore;
    use cwr_types::ErrorClass;
    use serde_json::json;

    /// Store whose server-side expansion returns only the root.
    fn store_with_chain(len: usize, cycle: bool) -> Arc<InMemoryObjectStore> {
        let store = InMemoryObjectStore::new().with_graph_depth(0);
        for i in 0..len {
            let next = if i + 1 < len {
                format!("cwr/n{}", i + 1)
            } else if cycle {
                "cwr/n0".to_string()
            } else {
                "end".to_string()
            };
            store.insert(format!("cwr/n{i}"), json!({"@type": "Thing", "next": next}));
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn cycle_within_depth_resolves_completely() {
        let store = store_with_chain(4, true);
        let resolver = Resolver::new(store);
        let graph = resolver
            .resolve(&ObjectId::new("cwr/n0"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(graph.len(), 4);
        assert!(graph.contains("cwr/n3"));
    }

    #[tokio::test]
    async fn cycle_beyond_depth_is_internal_error() {
        let store = store_with_chain(5, true);
        let resolver = Resolver::new(store);
        let err = resolver
            .resolve(&ObjectId::new("cwr/n0"), ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DepthExceeded { max_depth: 3, unresolved: 1, .. }
        ));
        assert_eq!(err.class(), ErrorClass::Internal);
    }

    #[tokio::test]
    async fn server_expansion_reduces_client_rounds() {
        let store = InMemoryObjectStore::new().with_graph_depth(2);
        for i in 0..5 {
            store.insert(format!("cwr/n{i}"), json!({"next": format!("cwr/n{}", i + 1)}));
        }
        store.insert("cwr/n5", json!({"name": "leaf"}));
        let store = Arc::new(store);
        let resolver = Resolver::new(store.clone());
        let graph = resolver
            .resolve(&ObjectId::new("cwr/n0"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(graph.len(), 6);
        assert_eq!(store.search_calls(), 3);
    }

    #[tokio::test]
    async fn batches_never_exceed_limit() {
        let store = InMemoryObjectStore::new().with_graph_depth(0);
        let parts: Vec<String> = (0..450).map(|i| format!("cwr/f{i:03}")).collect();
        store.insert("cwr/root", json!({"@type": "Dataset", "hasPart": parts}));
        for part in &parts {
            store.insert(part.as_str(), json!({"@type": "File"}));
        }
        let store = Arc::new(store);
        let resolver = Resolver::new(store.clone()).with_batch_size(1_000);
        let graph = resolver
            .resolve(&ObjectId::new("cwr/root"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(graph.len(), 451);
        assert_eq!(store.largest_batch(), MAX_BATCH_SIZE);
        assert_eq!(store.search_calls(), 3);
    }

    #[tokio::test]
    async fn missing_references_are_requested_once() {
        let store = InMemoryObjectStore::new().with_graph_depth(0);
        store.insert("cwr/root", json!({"hasPart": ["cwr/a", "cwr/hidden"]}));
        store.insert("cwr/a", json!({"about": "cwr/hidden"}));
        let store = Arc::new(store);
        let resolver = Resolver::new(store.clone());
        let graph = resolver
            .resolve(&ObjectId::new("cwr/root"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(store.search_calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_aborts() {
        let store = store_with_chain(2, false);
        store.set_offline(true);
        let resolver = Resolver::new(store);
        let err = resolver
            .resolve(&ObjectId::new("cwr/n0"), ResolveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Transport);
    }

    #[tokio::test]
    async fn unknown_root_is_not_found() {
        let resolver = Resolver::new(Arc::new(InMemoryObjectStore::new()));
        let err = resolver
            .resolve(&ObjectId::new("cwr/none"), ResolveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::NotFound);

        let err = resolver
            .resolve(
                &ObjectId::new("cwr/none"),
                ResolveOptions::default().strategy(ResolveStrategy::BatchWalk),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::RootMissing(_)));
    }

    #[tokio::test]
    async fn batch_walk_matches_graph_expansion() {
        let store = store_with_chain(3, false);
        let resolver = Resolver::new(store);
        let expanded = resolver
            .resolve(&ObjectId::new("cwr/n0"), ResolveOptions::default())
            .await
            .unwrap();
        let walked = resolver
            .resolve(
                &ObjectId::new("cwr/n0"),
                ResolveOptions::default().strategy(ResolveStrategy::BatchWalk),
            )
            .await
            .unwrap();
        assert_eq!(expanded.len(), walked.len());
    }

    #[tokio::test]
    async fn cache_serves_repeat_resolutions() {
        let store = store_with_chain(3, false);
        let resolver = Resolver::new(store.clone()).with_cache(GraphCache::default());
        let options = ResolveOptions::default();
        let first = resolver.resolve(&ObjectId::new("cwr/n0"), options).await.unwrap();
        let calls = store.search_calls();
        let second = resolver.resolve(&ObjectId::new("cwr/n0"), options).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.search_calls(), calls);

        // different options, different entry
        resolver
            .resolve(&ObjectId::new("cwr/n0"), options.nested(true))
            .await
            .unwrap();
        assert!(store.search_calls() > calls);
    }
}

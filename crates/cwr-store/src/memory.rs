use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use cwr_types::{IdPrefix, ObjectId};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ByteStream, GraphMethod, ObjectStore, ObjectSummary, SearchPage};

/// In-memory, map-based object store.
///
/// Intended for tests and embedding. Graph expansion follows references up to
/// a configurable depth (one hop by default, two for nested methods), so
/// callers can exercise their own handling of unexpanded references.
pub struct InMemoryObjectStore {
    prefix: IdPrefix,
    base_url: String,
    objects: RwLock<BTreeMap<ObjectId, Value>>,
    payloads: RwLock<HashMap<(ObjectId, String), Bytes>>,
    graph_depth: usize,
    offline: AtomicBool,
    search_calls: AtomicUsize,
    largest_batch: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            prefix: IdPrefix::default(),
            base_url: "https://cordra.test/".to_string(),
            objects: RwLock::new(BTreeMap::new()),
            payloads: RwLock::new(HashMap::new()),
            graph_depth: 1,
            offline: AtomicBool::new(false),
            search_calls: AtomicUsize::new(0),
            largest_batch: AtomicUsize::new(0),
        }
    }

    pub fn with_prefix(mut self, prefix: IdPrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Base URL used when building object and payload URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = format!("{}/", base_url.into().trim_end_matches('/'));
        self
    }

    /// Number of reference hops the server-side graph expansion follows.
    pub fn with_graph_depth(mut self, depth: usize) -> Self {
        self.graph_depth = depth;
        self
    }

    /// Insert an object. Its `@id` is set to `id`.
    pub fn insert(&self, id: impl Into<ObjectId>, content: Value) {
        let id = id.into();
        let content = match content {
            Value::Object(mut map) => {
                map.insert("@id".into(), Value::String(id.to_string()));
                Value::Object(map)
            }
            other => other,
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, content);
    }

    pub fn insert_payload(&self, id: impl Into<ObjectId>, name: &str, data: impl Into<Bytes>) {
        self.payloads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((id.into(), name.to_string()), data.into());
    }

    /// Make every call fail as if the repository were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of batch search calls served so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Largest identifier batch seen by `search_ids`.
    pub fn largest_batch(&self) -> usize {
        self.largest_batch.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::UnexpectedStatus {
                status: 503,
                url: self.base_url.clone(),
                body: "offline".into(),
            });
        }
        Ok(())
    }

    fn lookup(&self, id: &ObjectId) -> Option<Value> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn references(&self, value: &Value, out: &mut Vec<ObjectId>) {
        match value {
            Value::String(s) if self.prefix.matches(s) => out.push(ObjectId::new(s.as_str())),
            Value::Array(items) => items.iter().for_each(|v| self.references(v, out)),
            Value::Object(map) => {
                for (key, v) in map {
                    if key != "@id" {
                        self.references(v, out);
                    }
                }
            }
            _ => {}
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

fn is_dataset(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "Dataset",
        Some(Value::Array(ts)) => ts.iter().any(|t| t == "Dataset"),
        _ => false,
    }
}

fn has_parent(value: &Value) -> bool {
    value
        .as_object()
        .map(|m: &Map<String, Value>| m.contains_key("isPartOf"))
        .unwrap_or(false)
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn prefix(&self) -> &IdPrefix {
        &self.prefix
    }

    fn object_url(&self, id: &ObjectId, payload: Option<&str>) -> String {
        match payload {
            Some(name) => format!("{}objects/{id}?payload={name}", self.base_url),
            None => format!("{}objects/{id}", self.base_url),
        }
    }

    async fn object_graph(&self, id: &ObjectId, method: GraphMethod) -> StoreResult<Vec<Value>> {
        self.check_online()?;
        let root = self
            .lookup(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let depth = if method.is_nested() {
            self.graph_depth + 1
        } else {
            self.graph_depth
        };

        let mut seen: HashSet<ObjectId> = HashSet::from([id.clone()]);
        let mut graph = vec![root.clone()];
        let mut frontier = vec![root];
        for _ in 0..depth {
            let mut refs = Vec::new();
            for node in &frontier {
                self.references(node, &mut refs);
            }
            frontier.clear();
            for r in refs {
                if seen.insert(r.clone()) {
                    if let Some(obj) = self.lookup(&r) {
                        graph.push(obj.clone());
                        frontier.push(obj);
                    }
                }
            }
        }
        Ok(graph)
    }

    async fn search_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectSummary>> {
        self.check_online()?;
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.largest_batch.fetch_max(ids.len(), Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.lookup(id).map(|content| ObjectSummary {
                    id: id.clone(),
                    content,
                })
            })
            .collect())
    }

    async fn get_object(&self, id: &ObjectId) -> StoreResult<Value> {
        self.check_online()?;
        self.lookup(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_payload(&self, id: &ObjectId, name: &str) -> StoreResult<ByteStream> {
        self.check_online()?;
        let data = self
            .payloads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(id.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{id}?payload={name}")))?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok::<_, StoreError>(data)
        })))
    }

    async fn list_datasets(
        &self,
        page: usize,
        page_size: usize,
        include_nested: bool,
    ) -> StoreResult<SearchPage> {
        self.check_online()?;
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let matching: Vec<ObjectSummary> = objects
            .iter()
            .filter(|(_, v)| is_dataset(v) && (include_nested || !has_parent(v)))
            .map(|(id, v)| ObjectSummary {
                id: id.clone(),
                content: v.clone(),
            })
            .collect();
        let size = matching.len();
        let results = matching
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .collect();
        Ok(SearchPage {
            page_num: page as i64,
            page_size: page_size as i64,
            size,
            results,
        })
    }
}

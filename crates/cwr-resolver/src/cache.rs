use std::sync::Arc;
use std::time::Duration;

use cwr_types::ObjectId;
use moka::future::Cache;

use crate::graph::ResolvedGraph;
use crate::options::{ResolveOptions, ResolveStrategy};

/// Cache key: root identifier plus the options that change the result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub root: ObjectId,
    pub nested: bool,
    pub workflow_only: bool,
    pub strategy: ResolveStrategy,
}

impl CacheKey {
    pub fn new(root: &ObjectId, options: &ResolveOptions) -> Self {
        Self {
            root: root.clone(),
            nested: options.include_nested,
            workflow_only: options.workflow_only,
            strategy: options.strategy,
        }
    }
}

/// Time-bounded cache of resolved graphs.
///
/// Best-effort only. Concurrent resolutions of the same key may both miss and
/// both insert; the value is deterministic for a key, so the last write wins.
#[derive(Debug, Clone)]
pub struct GraphCache {
    inner: Cache<CacheKey, Arc<ResolvedGraph>>,
}

impl GraphCache {
    /// Default lifetime of a cached graph.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<ResolvedGraph>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, graph: Arc<ResolvedGraph>) {
        self.inner.insert(key, graph).await;
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::with_ttl(1_000, Self::DEFAULT_TTL)
    }
}

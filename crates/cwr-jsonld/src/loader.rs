use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use tracing::debug;

use crate::error::{JsonLdError, JsonLdResult};

/// A dereferenced JSON-LD document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    /// Final URL the document was read from.
    pub document_url: String,
    /// Context advertised through a Link header, if any.
    pub context_url: Option<String>,
    pub content_type: String,
    pub document: Value,
}

impl RemoteDocument {
    pub fn new(url: impl Into<String>, document: Value) -> Self {
        Self {
            document_url: url.into(),
            context_url: None,
            content_type: "application/ld+json".to_string(),
            document,
        }
    }

    /// The local context carried by this document.
    pub fn context(&self) -> Value {
        match &self.document {
            Value::Object(map) => map.get("@context").cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// Dereferences remote context documents.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, url: &str) -> JsonLdResult<RemoteDocument>;
}

/// Loader over a fixed set of documents.
///
/// Used for pre-bundled contexts and in tests. Counts loads so callers can
/// check cache behaviour.
#[derive(Debug, Default)]
pub struct StaticDocumentLoader {
    documents: HashMap<String, Value>,
    loads: AtomicUsize,
}

impl StaticDocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, document: Value) -> Self {
        self.documents.insert(url.into(), document);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for StaticDocumentLoader {
    async fn load(&self, url: &str) -> JsonLdResult<RemoteDocument> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(url)
            .map(|doc| RemoteDocument::new(url, doc.clone()))
            .ok_or_else(|| JsonLdError::LoadFailed {
                url: url.to_string(),
                reason: "unknown document".to_string(),
            })
    }
}

/// Wraps another loader with a time-bounded cache keyed by the URL's hash.
///
/// Failed loads are never cached.
pub struct CachingDocumentLoader {
    inner: Arc<dyn DocumentLoader>,
    cache: Cache<String, Arc<RemoteDocument>>,
}

impl CachingDocumentLoader {
    /// Default lifetime of a cached context document.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(inner: Arc<dyn DocumentLoader>) -> Self {
        Self::with_ttl(inner, 256, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(inner: Arc<dyn DocumentLoader>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    fn key(url: &str) -> String {
        blake3::hash(url.as_bytes()).to_hex().to_string()
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl std::fmt::Debug for CachingDocumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingDocumentLoader")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[async_trait]
impl DocumentLoader for CachingDocumentLoader {
    async fn load(&self, url: &str) -> JsonLdResult<RemoteDocument> {
        let key = Self::key(url);
        if let Some(doc) = self.cache.get(&key).await {
            debug!(%url, "context cache hit");
            return Ok(doc.as_ref().clone());
        }
        debug!(%url, "context cache miss");
        let doc = self.inner.load(url).await?;
        self.cache.insert(key, Arc::new(doc.clone())).await;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_loader_serves_known_documents() {
        let loader = StaticDocumentLoader::new()
            .with_document("http://ex.org/ctx", json!({"@context": {"name": "http://ex.org/name"}}));
        let doc = loader.load("http://ex.org/ctx").await.unwrap();
        assert_eq!(doc.context()["name"], "http://ex.org/name");
        assert!(loader.load("http://ex.org/other").await.is_err());
        assert_eq!(loader.loads(), 2);
    }

    #[tokio::test]
    async fn caching_loader_loads_once() {
        let inner = Arc::new(
            StaticDocumentLoader::new().with_document("http://ex.org/ctx", json!({"@context": {}})),
        );
        let loader = CachingDocumentLoader::new(inner.clone());
        for _ in 0..3 {
            loader.load("http://ex.org/ctx").await.unwrap();
        }
        assert_eq!(inner.loads(), 1);
    }

    #[tokio::test]
    async fn caching_loader_does_not_cache_failures() {
        let inner = Arc::new(StaticDocumentLoader::new());
        let loader = CachingDocumentLoader::new(inner.clone());
        assert!(loader.load("http://ex.org/missing").await.is_err());
        assert!(loader.load("http://ex.org/missing").await.is_err());
        assert_eq!(inner.loads(), 2);
    }
}

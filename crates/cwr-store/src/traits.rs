use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use cwr_types::{IdPrefix, ObjectId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Stream of payload bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// Server-side graph expansion procedure, selected by nesting and
/// workflow-only axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphMethod {
    AsGraph,
    AsNestedGraph,
    AsWorkflowGraph,
    AsNestedWorkflowGraph,
}

impl GraphMethod {
    pub fn select(nested: bool, workflow_only: bool) -> Self {
        match (nested, workflow_only) {
            (false, false) => Self::AsGraph,
            (true, false) => Self::AsNestedGraph,
            (false, true) => Self::AsWorkflowGraph,
            (true, true) => Self::AsNestedWorkflowGraph,
        }
    }

    /// Method name as understood by the repository.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AsGraph => "asGraph",
            Self::AsNestedGraph => "asNestedGraph",
            Self::AsWorkflowGraph => "asWorkflowGraph",
            Self::AsNestedWorkflowGraph => "asNestedWorkflowGraph",
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::AsNestedGraph | Self::AsNestedWorkflowGraph)
    }
}

/// One search hit: identifier plus object content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub id: ObjectId,
    pub content: Value,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub page_num: i64,
    /// `-1` when the repository returned everything in one page.
    pub page_size: i64,
    /// Total number of hits across all pages.
    pub size: usize,
    pub results: Vec<ObjectSummary>,
}

/// Read access to the digital-object repository.
///
/// Implementations must map access-control denials onto
/// [`StoreError::NotFound`] so callers cannot tell hidden objects from
/// missing ones.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Identifier prefix of this store.
    fn prefix(&self) -> &IdPrefix;

    /// Absolute URL of an object, or of one of its payloads.
    fn object_url(&self, id: &ObjectId, payload: Option<&str>) -> String;

    /// Expand the graph rooted at `id` on the server side.
    ///
    /// Returns the `@graph` node list. Every node carries its `@id`.
    async fn object_graph(&self, id: &ObjectId, method: GraphMethod) -> StoreResult<Vec<Value>>;

    /// Batch lookup by identifier. Missing identifiers are simply absent
    /// from the result. Callers keep batches at or below the configured
    /// batch size.
    async fn search_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectSummary>>;

    /// Fetch a single object.
    async fn get_object(&self, id: &ObjectId) -> StoreResult<Value>;

    /// Stream a named payload of an object.
    async fn get_payload(&self, id: &ObjectId, name: &str) -> StoreResult<ByteStream>;

    /// Page through datasets, newest first. Nested datasets (those with an
    /// `isPartOf` parent) are left out unless `include_nested` is set.
    async fn list_datasets(
        &self,
        page: usize,
        page_size: usize,
        include_nested: bool,
    ) -> StoreResult<SearchPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_method_selection() {
        assert_eq!(GraphMethod::select(false, false).as_str(), "asGraph");
        assert_eq!(GraphMethod::select(true, false).as_str(), "asNestedGraph");
        assert_eq!(GraphMethod::select(false, true).as_str(), "asWorkflowGraph");
        assert_eq!(
            GraphMethod::select(true, true).as_str(),
            "asNestedWorkflowGraph"
        );
        assert!(GraphMethod::AsNestedWorkflowGraph.is_nested());
        assert!(!GraphMethod::AsWorkflowGraph.is_nested());
    }

    #[test]
    fn search_page_uses_repository_field_names() {
        let page: SearchPage = serde_json::from_value(serde_json::json!({
            "pageNum": 0,
            "pageSize": 25,
            "size": 1,
            "results": [{"id": "cwr/a", "type": "Dataset", "content": {"name": "A"}}]
        }))
        .unwrap();
        assert_eq!(page.size, 1);
        assert_eq!(page.results[0].id.as_str(), "cwr/a");
    }
}

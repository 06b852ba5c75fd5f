use std::time::Duration;

use async_trait::async_trait;
use cwr_types::{IdPrefix, ObjectId};
use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{ByteStream, GraphMethod, ObjectStore, ObjectSummary, SearchPage};

/// HTTP client for a Cordra repository.
#[derive(Clone)]
pub struct CordraStore {
    client: Client,
    base_url: String,
    config: StoreConfig,
}

impl CordraStore {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| StoreError::InvalidConfig(format!("{}: {e}", config.base_url)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            base_url: config.normalized_base(),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.user {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, subject: &str) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED {
            debug!(%url, status = status.as_u16(), "object not visible");
            return Err(StoreError::NotFound(subject.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%url, status = status.as_u16(), "unexpected object store response");
        Err(StoreError::UnexpectedStatus {
            status: status.as_u16(),
            url,
            body,
        })
    }

    async fn json(response: Response) -> StoreResult<Value> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for CordraStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CordraStore")
            .field("base_url", &self.base_url)
            .field("prefix", &self.config.prefix)
            .finish()
    }
}

/// Lucene query matching any of the given identifiers.
pub(crate) fn id_query(ids: &[ObjectId]) -> String {
    ids.iter()
        .map(|id| format!("id:{id}"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Query for top-level (or all) datasets.
pub(crate) fn dataset_query(include_nested: bool) -> String {
    let mut query = String::from("type:Dataset");
    if !include_nested {
        query.push_str(" AND NOT /isPartOf/_:[* TO *]");
    }
    query
}

#[async_trait]
impl ObjectStore for CordraStore {
    fn prefix(&self) -> &IdPrefix {
        &self.config.prefix
    }

    fn object_url(&self, id: &ObjectId, payload: Option<&str>) -> String {
        let mut url = self.endpoint(&format!("objects/{id}"));
        if let Some(name) = payload {
            url.push_str("?payload=");
            url.extend(url::form_urlencoded::byte_serialize(name.as_bytes()));
        }
        url
    }

    async fn object_graph(&self, id: &ObjectId, method: GraphMethod) -> StoreResult<Vec<Value>> {
        debug!(object_id = %id, method = method.as_str(), "expanding object graph");
        let request = self
            .client
            .get(self.endpoint("cordra/call"))
            .query(&[("objectId", id.as_str()), ("method", method.as_str())]);
        let response = self.send(self.authenticated(request), id.as_str()).await?;
        match Self::json(response).await? {
            Value::Object(mut map) => match map.remove("@graph") {
                Some(Value::Array(nodes)) => Ok(nodes),
                _ => Err(StoreError::Decode("graph response has no @graph list".into())),
            },
            _ => Err(StoreError::Decode("graph response is not an object".into())),
        }
    }

    async fn search_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<ObjectSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = ids.len(), "batch object search");
        let query = id_query(ids);
        let request = self
            .client
            .get(self.endpoint("search"))
            .query(&[("query", query.as_str())]);
        let response = self.send(request, "search").await?;
        let page: SearchPage = serde_json::from_value(Self::json(response).await?)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(page.results)
    }

    async fn get_object(&self, id: &ObjectId) -> StoreResult<Value> {
        let request = self.client.get(self.object_url(id, None));
        let response = self.send(request, id.as_str()).await?;
        Self::json(response).await
    }

    async fn get_payload(&self, id: &ObjectId, name: &str) -> StoreResult<ByteStream> {
        let request = self.client.get(self.object_url(id, Some(name)));
        let response = self.send(request, &format!("{id}?payload={name}")).await?;
        Ok(Box::pin(response.bytes_stream().map_err(StoreError::from)))
    }

    async fn list_datasets(
        &self,
        page: usize,
        page_size: usize,
        include_nested: bool,
    ) -> StoreResult<SearchPage> {
        let query = dataset_query(include_nested);
        let request = self.client.get(self.endpoint("search")).query(&[
            ("pageNum", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("query", query),
            ("sortFields", "metadata/modifiedOn DESC ".to_string()),
        ]);
        let response = self.send(request, "search").await?;
        serde_json::from_value(Self::json(response).await?)
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

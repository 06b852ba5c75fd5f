use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use cwr_workflow::Submitter;

use crate::error::{ServerError, ServerResult};

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Anonymous,
}

impl Credentials {
    /// Read `X-Api-Key: <key>` or `Authorization: Api-Key <key>`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        if let Some(key) = header(API_KEY_HEADER).map(str::trim).filter(|k| !k.is_empty()) {
            return Self::ApiKey(key.to_string());
        }
        header("authorization")
            .and_then(|v| v.strip_prefix("Api-Key "))
            .map(|k| Self::ApiKey(k.trim().to_string()))
            .unwrap_or(Self::Anonymous)
    }
}

/// Maps credentials to the submitter they stand for.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Submitter>;
}

/// Static lookup of configured API keys.
pub struct ApiKeyAuth {
    keys: BTreeMap<String, Submitter>,
}

impl ApiKeyAuth {
    pub fn new(keys: BTreeMap<String, Submitter>) -> Self {
        Self { keys }
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("keys", &self.keys.len())
            .finish()
    }
}

#[async_trait]
impl AuthProvider for ApiKeyAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Submitter> {
        match credentials {
            Credentials::ApiKey(key) => self
                .keys
                .get(key)
                .cloned()
                .ok_or_else(|| ServerError::Unauthorized("unknown API key".into())),
            Credentials::Anonymous => Err(ServerError::Unauthorized("API key required".into())),
        }
    }
}

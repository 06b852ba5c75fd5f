use cwr_types::IdPrefix;
use serde::{Deserialize, Serialize};

/// Largest identifier batch the repository accepts in one search query.
/// Bigger queries overflow the request URI and the gateway answers 502.
pub const MAX_BATCH_SIZE: usize = 200;

/// Connection settings for the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the repository, e.g. `https://cordra.example.org/`.
    pub base_url: String,
    /// Identifier prefix; any string starting with it is a reference.
    pub prefix: IdPrefix,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Accept self-signed certificates.
    pub accept_invalid_certs: bool,
    /// Identifiers per batch search call. Clamped to [`MAX_BATCH_SIZE`].
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Base URL with exactly one trailing slash.
    pub fn normalized_base(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            prefix: IdPrefix::default(),
            user: None,
            password: None,
            accept_invalid_certs: false,
            batch_size: MAX_BATCH_SIZE,
            timeout_secs: 30,
        }
    }
}

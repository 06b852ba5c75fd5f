use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use cwr_store::StoreConfig;
use cwr_types::ObjectId;
use cwr_workflow::{ServiceConfig, Submitter};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Everything the server needs, loaded from one TOML file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub workflow_service: ServiceConfig,
    pub resolver: ResolverConfig,
    pub jsonld: JsonLdConfig,
    /// API key to the submitter it stands for.
    pub api_keys: BTreeMap<String, Submitter>,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Public base URL of this front end. Dataset pages live under it.
    pub public_base_url: String,
    /// Largest accepted workflow upload.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Public landing page of a dataset.
    pub fn dataset_page_url(&self, id: &ObjectId) -> String {
        format!("{}/datasets/{id}", self.public_base_url.trim_end_matches('/'))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            public_base_url: "http://127.0.0.1:8000".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub max_depth: usize,
    pub graph_cache_ttl_secs: u64,
    pub graph_cache_capacity: u64,
}

impl ResolverConfig {
    pub fn graph_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.graph_cache_ttl_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            graph_cache_ttl_secs: 15 * 60,
            graph_cache_capacity: 1_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonLdConfig {
    pub context_cache_ttl_secs: u64,
    pub context_cache_capacity: u64,
    pub timeout_secs: u64,
}

impl JsonLdConfig {
    pub fn context_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.context_cache_ttl_secs)
    }
}

impl Default for JsonLdConfig {
    fn default() -> Self {
        Self {
            context_cache_ttl_secs: 24 * 60 * 60,
            context_cache_capacity: 256,
            timeout_secs: 30,
        }
    }
}

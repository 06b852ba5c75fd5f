use std::sync::Arc;
use std::time::Duration;

use cwr_jsonld::{CachingDocumentLoader, DocumentLoader, Flattener, HttpDocumentLoader};
use cwr_pack::CrateStreamer;
use cwr_resolver::{GraphCache, ResolveOptions, Resolver};
use cwr_store::{CordraStore, ObjectStore};
use cwr_workflow::{HttpWorkflowService, Orchestrator, WorkflowService};
use tracing::info;

use crate::auth::{ApiKeyAuth, AuthProvider};
use crate::config::AppConfig;
use crate::error::{ServerError, ServerResult};
use crate::export::DatasetExporter;
use crate::scheme::StoreUrlScheme;

/// The remote systems the server talks to.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ObjectStore>,
    pub loader: Arc<dyn DocumentLoader>,
    pub workflow_service: Arc<dyn WorkflowService>,
    /// Client used to fetch remote payloads while packaging.
    pub http: reqwest::Client,
}

impl Backends {
    /// Live clients for every backend named in the configuration.
    pub fn connect(config: &AppConfig) -> ServerResult<Self> {
        let store = CordraStore::new(config.store.clone())?;
        let loader = HttpDocumentLoader::new(Duration::from_secs(config.jsonld.timeout_secs))?;
        let workflow_service = HttpWorkflowService::new(config.workflow_service.clone())?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.store.accept_invalid_certs)
            .build()
            .map_err(|e| ServerError::Config(format!("payload client: {e}")))?;
        info!(
            store = %config.store.base_url,
            workflow_service = %config.workflow_service.base_url,
            "connected backends"
        );
        Ok(Self {
            store: Arc::new(store),
            loader: Arc::new(loader),
            workflow_service: Arc::new(workflow_service),
            http,
        })
    }
}

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ObjectStore>,
    pub exporter: Arc<DatasetExporter>,
    pub orchestrator: Orchestrator,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> ServerResult<Self> {
        let backends = Backends::connect(&config)?;
        Ok(Self::new(config, backends))
    }

    pub fn new(config: AppConfig, backends: Backends) -> Self {
        let cache = GraphCache::with_ttl(
            config.resolver.graph_cache_capacity,
            config.resolver.graph_cache_ttl(),
        );
        let resolver = Resolver::new(Arc::clone(&backends.store))
            .with_cache(cache)
            .with_batch_size(config.store.effective_batch_size());
        let loader = CachingDocumentLoader::with_ttl(
            backends.loader,
            config.jsonld.context_cache_capacity,
            config.jsonld.context_cache_ttl(),
        );
        let exporter = DatasetExporter::new(
            resolver,
            Flattener::new(Arc::new(loader)),
            StoreUrlScheme::new(Arc::clone(&backends.store), config.server.clone()),
            CrateStreamer::new(backends.http),
        )
        .with_resolve_options(ResolveOptions::default().max_depth(config.resolver.max_depth));

        Self {
            auth: Arc::new(ApiKeyAuth::new(config.api_keys.clone())),
            orchestrator: Orchestrator::new(backends.workflow_service),
            exporter: Arc::new(exporter),
            store: backends.store,
            config: Arc::new(config),
        }
    }
}

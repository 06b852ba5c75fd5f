use std::sync::Arc;

use cwr_crate::UrlScheme;
use cwr_store::ObjectStore;
use cwr_types::ObjectId;

use crate::config::ServerConfig;

/// Object and payload URLs point into the store; dataset pages point at
/// this front end.
#[derive(Clone)]
pub struct StoreUrlScheme {
    store: Arc<dyn ObjectStore>,
    server: ServerConfig,
}

impl StoreUrlScheme {
    pub fn new(store: Arc<dyn ObjectStore>, server: ServerConfig) -> Self {
        Self { store, server }
    }
}

impl UrlScheme for StoreUrlScheme {
    fn object_url(&self, id: &ObjectId) -> String {
        self.store.object_url(id, None)
    }

    fn payload_url(&self, id: &ObjectId, payload: &str) -> String {
        self.store.object_url(id, Some(payload))
    }

    fn dataset_page_url(&self, id: &ObjectId) -> String {
        self.server.dataset_page_url(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cwr_store::InMemoryObjectStore;

    #[test]
    fn splits_store_and_page_urls() {
        let scheme = StoreUrlScheme::new(
            Arc::new(InMemoryObjectStore::new()),
            ServerConfig {
                public_base_url: "https://cwr.example.org/".into(),
                ..ServerConfig::default()
            },
        );
        let id = ObjectId::new("cwr/a");
        assert_eq!(scheme.object_url(&id), "https://cordra.test/objects/cwr/a");
        assert_eq!(
            scheme.payload_url(&id, "data.csv"),
            "https://cordra.test/objects/cwr/a?payload=data.csv"
        );
        assert_eq!(
            scheme.dataset_page_url(&id),
            "https://cwr.example.org/datasets/cwr/a"
        );
    }
}

//! Remote URL derivation for resolved objects.

use std::collections::HashMap;

use cwr_types::{as_list, string_or_reference, type_tags, ObjectId};
use serde_json::Value;

/// Internal identifier to externally dereferenceable URL.
pub type RemoteUrls = HashMap<ObjectId, String>;

/// Builds the public URLs of store objects.
pub trait UrlScheme {
    /// URL of the object itself.
    fn object_url(&self, id: &ObjectId) -> String;

    /// URL of a named payload of the object.
    fn payload_url(&self, id: &ObjectId, payload: &str) -> String;

    /// Public landing page of a dataset.
    fn dataset_page_url(&self, id: &ObjectId) -> String;
}

/// Compute the remote URL of every object that should be addressable
/// outside the store.
///
/// Objects with a `contentUrl` point at their payload, objects with an
/// `identifier` at themselves, and datasets (plus their `isPartOf`
/// parents) at their landing page. Everything else gets no entry.
pub fn derive_remote_urls<'a>(
    objects: impl IntoIterator<Item = &'a Value>,
    scheme: &dyn UrlScheme,
) -> RemoteUrls {
    let mut urls = RemoteUrls::new();
    for object in objects {
        let Some(id) = object.get("@id").and_then(Value::as_str) else {
            continue;
        };
        let id = ObjectId::new(id);
        if let Some(payload) = object.get("contentUrl").and_then(string_or_reference) {
            let url = scheme.payload_url(&id, payload);
            urls.insert(id, url);
        } else if object.get("identifier").is_some() {
            let url = scheme.object_url(&id);
            urls.insert(id, url);
        } else if type_tags(object.get("@type")).iter().any(|t| t == "Dataset") {
            let parents: Vec<ObjectId> = object
                .get("isPartOf")
                .map(|v| {
                    as_list(v)
                        .into_iter()
                        .filter_map(string_or_reference)
                        .map(ObjectId::new)
                        .collect()
                })
                .unwrap_or_default();
            for parent in parents {
                let url = scheme.dataset_page_url(&parent);
                urls.insert(parent, url);
            }
            let url = scheme.dataset_page_url(&id);
            urls.insert(id, url);
        }
    }
    urls
}

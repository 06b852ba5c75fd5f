use serde::{Deserialize, Serialize};

/// Connection settings for the execution backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub accept_invalid_certs: bool,
    pub timeout_secs: u64,
}

impl ServiceConfig {
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
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/".to_string(),
            user: None,
            password: None,
            accept_invalid_certs: false,
            timeout_secs: 60,
        }
    }
}

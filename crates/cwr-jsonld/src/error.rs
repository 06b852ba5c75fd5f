use cwr_types::ErrorClass;

/// Errors from context loading and graph flattening.
#[derive(Debug, thiserror::Error)]
pub enum JsonLdError {
    /// Only absolute `http`/`https` URLs can be dereferenced.
    #[error("URL could not be dereferenced; only \"http\" and \"https\" URLs are supported: {0}")]
    InvalidUrl(String),

    #[error("loading document {url} failed: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("URL {0} has more than one associated context Link header")]
    MultipleContextLinks(String),

    #[error("context {0} includes itself")]
    RecursiveContext(String),

    /// A remote context was referenced but never loaded.
    #[error("context {0} was not loaded")]
    ContextNotLoaded(String),

    #[error("invalid local context: {0}")]
    InvalidContext(String),

    #[error("invalid term definition for {term}: {reason}")]
    InvalidTermDefinition { term: String, reason: String },

    #[error("cyclic IRI mapping for term {0}")]
    CyclicIriMapping(String),

    #[error("invalid {keyword} value: {reason}")]
    InvalidKeywordValue {
        keyword: &'static str,
        reason: String,
    },
}

impl JsonLdError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::LoadFailed { .. } | Self::MultipleContextLinks(_) => ErrorClass::Transport,
            _ => ErrorClass::Internal,
        }
    }
}

impl From<reqwest::Error> for JsonLdError {
    fn from(err: reqwest::Error) -> Self {
        Self::LoadFailed {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: err.to_string(),
        }
    }
}

/// Result alias for JSON-LD operations.
pub type JsonLdResult<T> = Result<T, JsonLdError>;

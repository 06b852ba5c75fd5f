use cwr_types::ErrorClass;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The object does not exist or is not visible to this client.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The repository answered with an unexpected status.
    #[error("object store returned {status} for {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    /// The repository could not be reached.
    #[error("object store unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The repository's answer could not be decoded.
    #[error("malformed object store response: {0}")]
    Decode(String),

    /// The client configuration is unusable.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::UnexpectedStatus { .. } | Self::Unreachable(_) | Self::Decode(_) => {
                ErrorClass::Transport
            }
            Self::InvalidConfig(_) => ErrorClass::Internal,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

use cwr_types::ErrorClass;

/// Errors from the execution backend and the submission steps.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The upload is not a usable RO-Crate archive.
    #[error("invalid RO-Crate: {0}")]
    InvalidCrate(String),

    #[error("webhook URL uses unsupported placeholders: {}", .0.join(", "))]
    UnsupportedPlaceholders(Vec<String>),

    #[error("invalid webhook URL {url}: {reason}")]
    InvalidWebhookUrl { url: String, reason: String },

    #[error("workflow {0} not found")]
    NotFound(String),

    #[error("execution backend returned {status} for {url}: {body}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("execution backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("malformed execution backend response: {0}")]
    Decode(String),

    #[error("invalid execution backend configuration: {0}")]
    InvalidConfig(String),

    /// A step was run out of order.
    #[error("submission is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl WorkflowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCrate(_)
            | Self::UnsupportedPlaceholders(_)
            | Self::InvalidWebhookUrl { .. } => ErrorClass::Validation,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::UnexpectedStatus { .. } | Self::Unreachable(_) | Self::Decode(_) => {
                ErrorClass::Transport
            }
            Self::InvalidConfig(_) | Self::InvalidState { .. } => ErrorClass::Internal,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cwr_types::{ErrorClass, TypeError};
use cwr_workflow::WorkflowError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    InvalidId(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] cwr_store::StoreError),

    #[error(transparent)]
    Resolve(#[from] cwr_resolver::ResolveError),

    #[error(transparent)]
    JsonLd(#[from] cwr_jsonld::JsonLdError),

    #[error(transparent)]
    Crate(#[from] cwr_crate::CrateError),

    #[error(transparent)]
    Pack(#[from] cwr_pack::PackError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthorized(_) | Self::BadRequest(_) => ErrorClass::Validation,
            Self::InvalidId(e) => e.class(),
            Self::Store(e) => e.class(),
            Self::Resolve(e) => e.class(),
            Self::JsonLd(e) => e.class(),
            Self::Crate(e) => e.class(),
            Self::Pack(e) => e.class(),
            Self::Workflow(e) => e.class(),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        if matches!(self, Self::Unauthorized(_)) {
            return StatusCode::UNAUTHORIZED;
        }
        match self.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::UpstreamRejection => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Transport => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(class = %self.class(), error = %self, "request failed");
        } else {
            warn!(class = %self.class(), error = %self, "request rejected");
        }
        let body = json!({
            "status": self.class().as_str(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

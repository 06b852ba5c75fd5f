use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all CWR endpoints.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_bytes;
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/datasets", get(handler::list_datasets_handler))
        .route("/datasets/*id", get(handler::dataset_handler))
        .route(
            "/api/workflows/submit",
            post(handler::submit_workflow_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/workflows", get(handler::list_workflows_handler))
        .route("/api/workflows/:workflow_id", get(handler::workflow_detail_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

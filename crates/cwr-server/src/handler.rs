use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use cwr_store::SearchPage;
use cwr_types::ObjectId;
use cwr_workflow::{SubmissionOutcome, SubmissionStatus, SubmitForm, WorkflowSummary};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::auth::Credentials;
use crate::error::{ServerError, ServerResult};
use crate::export::ExportFormat;
use crate::state::AppState;

/// Multipart field carrying the uploaded crate.
pub const UPLOAD_FIELD: &str = "rocratefile";

pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "cwr-server",
        "version": env!("CARGO_PKG_VERSION"),
        "prefix": state.store.prefix().as_str(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatasetListQuery {
    pub page: usize,
    pub page_size: usize,
    pub nested: bool,
}

impl Default for DatasetListQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 25,
            nested: false,
        }
    }
}

pub async fn list_datasets_handler(
    State(state): State<AppState>,
    Query(query): Query<DatasetListQuery>,
) -> ServerResult<Json<SearchPage>> {
    let page = state
        .store
        .list_datasets(query.page, query.page_size, query.nested)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Default, Deserialize)]
pub struct DatasetQuery {
    pub format: Option<String>,
    pub download: Option<String>,
}

fn accepts(headers: &HeaderMap) -> String {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// `GET /datasets/{id}`: the stored object, its crate metadata, or the
/// packaged crate.
pub async fn dataset_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(query): Query<DatasetQuery>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let id = state.store.prefix().parse_id(&raw_id)?;
    // Hidden and missing datasets both end here as 404.
    let object = state.store.get_object(&id).await?;

    let format = match &query.format {
        Some(raw) => raw.parse()?,
        None => ExportFormat::Json,
    };
    let accept = accepts(&headers);
    let download = query
        .download
        .as_deref()
        .is_some_and(|d| d.eq_ignore_ascii_case("true"))
        || accept == "application/zip";
    debug!(dataset = %id, ?format, download, "dataset requested");

    match format {
        ExportFormat::Json => Ok(Json(object).into_response()),
        ExportFormat::RoCrate | ExportFormat::WorkflowRoCrate => {
            let krate = state
                .exporter
                .build_crate(&id, format.workflow_only(), download)
                .await?;
            if !download {
                return Ok(Json(krate.metadata_document()).into_response());
            }
            archive_response(&state, &id, &krate)
        }
    }
}

fn archive_response(
    state: &AppState,
    id: &ObjectId,
    krate: &cwr_crate::RoCrate,
) -> ServerResult<Response> {
    let stream = state.exporter.stream(krate)?;
    let disposition = format!("attachment; filename={}", id.archive_name());
    info!(dataset = %id, archive = %id.archive_name(), "streaming crate archive");
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuery {
    pub dry_run: Option<String>,
}

fn outcome_status(outcome: &SubmissionOutcome) -> StatusCode {
    match outcome.status {
        SubmissionStatus::InvalidCrate => StatusCode::BAD_REQUEST,
        SubmissionStatus::InvalidWorkflow | SubmissionStatus::SubmissionFailed => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SubmissionStatus::ValidRequest | SubmissionStatus::Submitted => StatusCode::OK,
    }
}

/// `POST /api/workflows/submit`: run an uploaded workflow crate through
/// validation, lint and submission in one request.
pub async fn submit_workflow_handler(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<SubmissionOutcome>)> {
    let submitter = state
        .auth
        .authenticate(&Credentials::from_headers(&headers))
        .await?;

    let mut upload = None;
    let mut fields: Vec<(String, String)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == UPLOAD_FIELD {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(e.to_string()))?;
            upload = Some((content_type, bytes.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ServerError::BadRequest(e.to_string()))?;
            fields.push((name, value));
        }
    }
    if let Some(dry_run) = query.dry_run {
        fields.push(("dry_run".into(), dry_run));
    }
    let (content_type, bytes) = upload
        .ok_or_else(|| ServerError::BadRequest(format!("multipart field {UPLOAD_FIELD} is required")))?;

    let form = SubmitForm::from_fields(fields);
    info!(
        submitter = %submitter.name,
        size = bytes.len(),
        dry_run = form.dry_run,
        "workflow submission received"
    );
    let outcome = state
        .orchestrator
        .run(&content_type, bytes, form, &submitter)
        .await?;
    Ok((outcome_status(&outcome), Json(outcome)))
}

pub async fn list_workflows_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<Vec<WorkflowSummary>>> {
    state
        .auth
        .authenticate(&Credentials::from_headers(&headers))
        .await?;
    Ok(Json(state.orchestrator.service().list().await?))
}

pub async fn workflow_detail_handler(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    headers: HeaderMap,
) -> ServerResult<Json<Value>> {
    state
        .auth
        .authenticate(&Credentials::from_headers(&headers))
        .await?;
    Ok(Json(state.orchestrator.service().detail(&workflow_id).await?))
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::service::{BackendReply, SubmitRequest, WorkflowService, WorkflowSummary};

const WORKFLOW_FILE: &str = "workflow.yaml";

/// HTTP client for the workflow execution backend.
#[derive(Clone)]
pub struct HttpWorkflowService {
    client: Client,
    base_url: String,
    config: ServiceConfig,
}

impl HttpWorkflowService {
    pub fn new(config: ServiceConfig) -> WorkflowResult<Self> {
        url::Url::parse(&config.base_url)
            .map_err(|e| WorkflowError::InvalidConfig(format!("{}: {e}", config.base_url)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            base_url: config.normalized_base(),
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.user {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    fn workflow_form(workflow_yaml: &str) -> WorkflowResult<Form> {
        let file = Part::text(workflow_yaml.to_string())
            .file_name(WORKFLOW_FILE)
            .mime_str("application/yaml")?;
        Ok(Form::new().part("file", file))
    }

    async fn unexpected(response: Response) -> WorkflowError {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        warn!(%url, status, "unexpected execution backend response");
        WorkflowError::UnexpectedStatus { status, url, body }
    }

    async fn json(response: Response) -> WorkflowResult<Value> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| WorkflowError::Decode(e.to_string()))
    }

    /// A 4xx body as JSON, or wrapped as `{"detail": text}` when it is not.
    async fn rejection_body(response: Response) -> Value {
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str(&text).unwrap_or_else(|_| json!({ "detail": text }))
    }
}

impl std::fmt::Debug for HttpWorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWorkflowService")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl WorkflowService for HttpWorkflowService {
    async fn check(&self, workflow_yaml: &str) -> WorkflowResult<BackendReply> {
        let request = self
            .client
            .post(self.endpoint("workflow/check"))
            .multipart(Self::workflow_form(workflow_yaml)?);
        let response = self.authenticated(request).send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), "workflow check answered");
        if status == StatusCode::OK {
            return Ok(BackendReply::Accepted(Self::json(response).await?));
        }
        if status == StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            match serde_json::from_str::<Value>(&text) {
                Ok(body) if body.get("detail").is_some() => {
                    return Ok(BackendReply::Rejected(body));
                }
                _ => {
                    return Err(WorkflowError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: self.endpoint("workflow/check"),
                        body: text,
                    })
                }
            }
        }
        Err(Self::unexpected(response).await)
    }

    async fn submit(&self, request: &SubmitRequest) -> WorkflowResult<BackendReply> {
        let mut form = Self::workflow_form(&request.workflow_yaml)?;
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        let call = self
            .client
            .post(self.endpoint("workflow/submit"))
            .multipart(form);
        let response = self.authenticated(call).send().await?;
        let status = response.status();
        info!(
            status = status.as_u16(),
            dry_run = request.dry_run,
            title = %request.title,
            "workflow submit answered"
        );
        if status.is_success() {
            return Ok(BackendReply::Accepted(Self::json(response).await?));
        }
        if status.is_client_error() {
            return Ok(BackendReply::Rejected(Self::rejection_body(response).await));
        }
        Err(Self::unexpected(response).await)
    }

    async fn detail(&self, workflow_id: &str) -> WorkflowResult<Value> {
        let request = self
            .client
            .get(self.endpoint(&format!("workflow/detail/{workflow_id}")));
        let response = self.authenticated(request).send().await?;
        match response.status() {
            StatusCode::OK => Self::json(response).await,
            StatusCode::NOT_FOUND => Err(WorkflowError::NotFound(workflow_id.to_string())),
            _ => Err(Self::unexpected(response).await),
        }
    }

    async fn list(&self) -> WorkflowResult<Vec<WorkflowSummary>> {
        let request = self.client.get(self.endpoint("workflow/list"));
        let response = self.authenticated(request).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(response).await);
        }
        let body = Self::json(response).await?;
        serde_json::from_value(body).map_err(|e| WorkflowError::Decode(e.to_string()))
    }
}

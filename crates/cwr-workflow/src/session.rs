//! The submission state machine.
//!
//! ```text
//! Received --validate--> Validated --lint--> Linted --submit--> Submitted
//!     |                      |                  |
//!     +-------> Rejected <---+------------------+
//! ```
//!
//! A step that fails with an error (backend unreachable, bad webhook URL)
//! leaves the submission where it was, so the step can be retried.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::{CrateArchive, UploadedWorkflow};
use crate::error::{WorkflowError, WorkflowResult};
use crate::service::{declared_parameters, BackendReply, SubmitRequest, WorkflowParameter, WorkflowService};
use crate::webhook::validate_webhook_url;

/// Form fields carrying parameter overrides start with this.
pub const PARAM_PREFIX: &str = "param-";

/// Machine-readable outcome of a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    InvalidCrate,
    InvalidWorkflow,
    SubmissionFailed,
    ValidRequest,
    Submitted,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCrate => "Invalid RO-Crate",
            Self::InvalidWorkflow => "Invalid workflow",
            Self::SubmissionFailed => "Submission Failed",
            Self::ValidRequest => "Valid Request",
            Self::Submitted => "Submitted",
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidCrate | Self::InvalidWorkflow | Self::SubmissionFailed
        )
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SubmissionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Where a submission ended up.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub workflow_id: String,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// A linted workflow waiting for submission.
#[derive(Clone, Debug)]
pub struct LintedWorkflow {
    pub workflow: UploadedWorkflow,
    /// Parameters the backend found, with their defaults.
    pub parameters: Vec<WorkflowParameter>,
}

#[derive(Debug)]
pub enum SubmissionState {
    Received { content_type: String, bytes: Vec<u8> },
    Validated(UploadedWorkflow),
    Linted(LintedWorkflow),
    Submitted(SubmissionOutcome),
    Rejected(SubmissionOutcome),
    /// Transient marker while a step owns the previous state.
    Transitioning,
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received { .. } => "received",
            Self::Validated(_) => "validated",
            Self::Linted(_) => "linted",
            Self::Submitted(_) => "submitted",
            Self::Rejected(_) => "rejected",
            Self::Transitioning => "transitioning",
        }
    }
}

/// Who submits. Always taken from an authenticated identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct Submitter {
    pub name: String,
    pub orcid: String,
}

impl Submitter {
    pub fn new(name: impl Into<String>, orcid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orcid: orcid.into(),
        }
    }

    /// The submitter's identity URL.
    pub fn identity_url(&self) -> String {
        if self.orcid.starts_with("https://") || self.orcid.starts_with("http://") {
            self.orcid.clone()
        } else {
            format!("https://orcid.org/{}", self.orcid)
        }
    }
}

/// User choices for the submit step. Unset fields fall back to the
/// crate's root dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub license: Option<String>,
    pub parameters: IndexMap<String, String>,
    pub dry_run: bool,
    pub force: bool,
    pub webhook_url: Option<String>,
}

impl Default for SubmitForm {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            keywords: None,
            license: None,
            parameters: IndexMap::new(),
            dry_run: false,
            force: true,
            webhook_url: None,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "dryrun"
    )
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl SubmitForm {
    /// Build a form from submitted field pairs. `param-*` fields become
    /// overrides, whatever the workflow declares.
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = Self::default();
        for (key, value) in fields {
            let (key, value) = (key.as_ref(), value.as_ref());
            if let Some(name) = key.strip_prefix(PARAM_PREFIX) {
                form.parameters.insert(name.to_string(), value.to_string());
                continue;
            }
            match key {
                "title" => form.title = non_empty(value),
                "description" => form.description = non_empty(value),
                "keywords" => {
                    form.keywords = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|k| !k.is_empty())
                            .map(str::to_string)
                            .collect(),
                    )
                }
                "license" => form.license = non_empty(value),
                "dry_run" | "dryrun" => form.dry_run = flag(value),
                "force" => form.force = flag(value),
                "webhook_url" => form.webhook_url = non_empty(value),
                _ => {}
            }
        }
        form
    }
}

/// One upload moving through the state machine.
#[derive(Debug)]
pub struct Submission {
    id: Uuid,
    state: SubmissionState,
}

impl Submission {
    /// Accept an uploaded archive.
    pub fn receive(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let submission = Self {
            id: Uuid::new_v4(),
            state: SubmissionState::Received {
                content_type: content_type.into(),
                bytes,
            },
        };
        info!(submission = %submission.id, size = submission.received_size(), "received archive");
        submission
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// The final outcome, once the submission is submitted or rejected.
    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        match &self.state {
            SubmissionState::Submitted(outcome) | SubmissionState::Rejected(outcome) => {
                Some(outcome)
            }
            _ => None,
        }
    }

    pub fn workflow(&self) -> Option<&UploadedWorkflow> {
        match &self.state {
            SubmissionState::Validated(workflow) => Some(workflow),
            SubmissionState::Linted(linted) => Some(&linted.workflow),
            _ => None,
        }
    }

    fn received_size(&self) -> usize {
        match &self.state {
            SubmissionState::Received { bytes, .. } => bytes.len(),
            _ => 0,
        }
    }

    fn reject(&mut self, status: SubmissionStatus, details: Value) {
        warn!(submission = %self.id, status = %status, "submission rejected");
        self.state = SubmissionState::Rejected(SubmissionOutcome {
            workflow_id: self.id.to_string(),
            status,
            details: Some(details),
        });
    }

    fn unexpected(&self, expected: &'static str) -> WorkflowError {
        WorkflowError::InvalidState {
            expected,
            actual: self.state.name(),
        }
    }

    /// `Received -> Validated`, or `Rejected("Invalid RO-Crate")` when the
    /// upload is not a zip, has no main entity or license, or lacks the
    /// workflow file.
    pub fn validate(&mut self) -> WorkflowResult<&SubmissionState> {
        if !matches!(self.state, SubmissionState::Received { .. }) {
            return Err(self.unexpected("received"));
        }
        let SubmissionState::Received {
            content_type,
            bytes,
        } = std::mem::replace(&mut self.state, SubmissionState::Transitioning)
        else {
            return Err(self.unexpected("received"));
        };
        match CrateArchive::open(&content_type, bytes).and_then(CrateArchive::extract) {
            Ok(workflow) => {
                info!(submission = %self.id, main_entity = %workflow.main_entity, "archive validated");
                self.state = SubmissionState::Validated(workflow);
            }
            Err(WorkflowError::InvalidCrate(detail)) => {
                self.reject(SubmissionStatus::InvalidCrate, json!({ "detail": detail }));
            }
            Err(other) => {
                self.reject(SubmissionStatus::InvalidCrate, json!({ "detail": other.to_string() }));
            }
        }
        Ok(&self.state)
    }
}

/// Drives submissions against an execution backend.
#[derive(Clone)]
pub struct Orchestrator {
    service: Arc<dyn WorkflowService>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<dyn WorkflowService> {
        &self.service
    }

    /// `Validated -> Linted`, or `Rejected("Invalid workflow")` with the
    /// backend's details. Transport failures leave the submission validated.
    pub async fn lint<'a>(&self, submission: &'a mut Submission) -> WorkflowResult<&'a SubmissionState> {
        let SubmissionState::Validated(workflow) = &submission.state else {
            return Err(submission.unexpected("validated"));
        };
        let reply = self.service.check(&workflow.yaml).await?;
        match reply {
            BackendReply::Accepted(body) => {
                let SubmissionState::Validated(workflow) =
                    std::mem::replace(&mut submission.state, SubmissionState::Transitioning)
                else {
                    return Err(submission.unexpected("validated"));
                };
                let parameters = declared_parameters(&body);
                info!(submission = %submission.id, parameters = parameters.len(), "workflow linted");
                submission.state = SubmissionState::Linted(LintedWorkflow {
                    workflow,
                    parameters,
                });
            }
            BackendReply::Rejected(details) => {
                submission.reject(SubmissionStatus::InvalidWorkflow, details);
            }
        }
        Ok(&submission.state)
    }

    /// `Linted -> Submitted`, or `Rejected("Submission Failed")`.
    ///
    /// A dry run ends in `"Valid Request"`. The webhook URL is checked before
    /// anything is sent; a bad one is an error and keeps the submission
    /// linted.
    pub async fn submit<'a>(
        &self,
        submission: &'a mut Submission,
        form: SubmitForm,
        submitter: &Submitter,
    ) -> WorkflowResult<&'a SubmissionState> {
        let SubmissionState::Linted(linted) = &submission.state else {
            return Err(submission.unexpected("linted"));
        };
        if let Some(webhook) = &form.webhook_url {
            validate_webhook_url(webhook)?;
        }

        let summary = &linted.workflow.summary;
        let request = SubmitRequest {
            workflow_yaml: linted.workflow.yaml.clone(),
            title: form
                .title
                .or_else(|| summary.title.clone())
                .unwrap_or_else(|| "Workflow".to_string()),
            description: form
                .description
                .or_else(|| summary.description.clone())
                .unwrap_or_default(),
            submitter_name: submitter.name.clone(),
            submitter_id: submitter.identity_url(),
            license: form.license.or_else(|| Some(summary.license.clone())),
            keywords: form.keywords.unwrap_or_else(|| summary.keywords.clone()),
            override_parameters: form.parameters,
            dry_run: form.dry_run,
            force: form.force,
            webhook_url: form.webhook_url,
        };

        let reply = self.service.submit(&request).await?;
        match reply {
            BackendReply::Accepted(body) => {
                let workflow_id = body
                    .get("workflow_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| submission.id.to_string());
                let status = if request.dry_run {
                    SubmissionStatus::ValidRequest
                } else {
                    SubmissionStatus::Submitted
                };
                info!(submission = %submission.id, %workflow_id, status = %status, "workflow submitted");
                submission.state = SubmissionState::Submitted(SubmissionOutcome {
                    workflow_id,
                    status,
                    details: None,
                });
            }
            BackendReply::Rejected(details) => {
                submission.reject(SubmissionStatus::SubmissionFailed, details);
            }
        }
        Ok(&submission.state)
    }

    /// Run all three steps on one upload and return where it ended.
    pub async fn run(
        &self,
        content_type: &str,
        bytes: Vec<u8>,
        form: SubmitForm,
        submitter: &Submitter,
    ) -> WorkflowResult<SubmissionOutcome> {
        let mut submission = Submission::receive(content_type, bytes);
        submission.validate()?;
        if matches!(submission.state, SubmissionState::Validated(_)) {
            self.lint(&mut submission).await?;
        }
        if matches!(submission.state, SubmissionState::Linted(_)) {
            self.submit(&mut submission, form, submitter).await?;
        }
        submission
            .outcome()
            .cloned()
            .ok_or_else(|| submission.unexpected("submitted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_split_overrides_from_options() {
        let form = SubmitForm::from_fields([
            ("param-text", "hello"),
            ("param-n", "3"),
            ("title", "  My run "),
            ("keywords", "a, b,,c"),
            ("dry_run", "true"),
            ("force", "false"),
            ("webhook_url", ""),
            ("csrfmiddlewaretoken", "x"),
        ]);
        assert_eq!(form.parameters.get("text").map(String::as_str), Some("hello"));
        assert_eq!(form.parameters.get("n").map(String::as_str), Some("3"));
        assert_eq!(form.title.as_deref(), Some("My run"));
        assert_eq!(form.keywords, Some(vec!["a".into(), "b".into(), "c".into()]));
        assert!(form.dry_run);
        assert!(!form.force);
        assert_eq!(form.webhook_url, None);
    }

    #[test]
    fn defaults_force_resubmission() {
        let form = SubmitForm::from_fields(Vec::<(String, String)>::new());
        assert!(form.force);
        assert!(!form.dry_run);
    }

    #[test]
    fn submitter_identity_is_an_orcid_url() {
        assert_eq!(
            Submitter::new("Lena", "0000-0001-2345-6789").identity_url(),
            "https://orcid.org/0000-0001-2345-6789"
        );
        assert_eq!(
            Submitter::new("Lena", "https://orcid.org/0000-0001-2345-6789").identity_url(),
            "https://orcid.org/0000-0001-2345-6789"
        );
    }

    #[test]
    fn broken_upload_is_rejected_not_failed() {
        let mut submission = Submission::receive("application/zip", b"garbage".to_vec());
        submission.validate().unwrap();
        let outcome = submission.outcome().unwrap();
        assert_eq!(outcome.status, SubmissionStatus::InvalidCrate);
        assert_eq!(outcome.status.as_str(), "Invalid RO-Crate");
        assert!(matches!(
            submission.validate(),
            Err(WorkflowError::InvalidState { expected: "received", actual: "rejected" })
        ));
    }

    #[test]
    fn outcome_serializes_status_strings() {
        let outcome = SubmissionOutcome {
            workflow_id: "wf-1".into(),
            status: SubmissionStatus::ValidRequest,
            details: None,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"workflow_id": "wf-1", "status": "Valid Request"})
        );
    }
}

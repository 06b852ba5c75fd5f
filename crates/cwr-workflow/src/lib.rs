//! Workflow submission for the CWR front end.
//!
//! A user uploads an RO-Crate archive whose main entity is a workflow
//! definition. The archive is validated locally, the definition is linted by
//! the execution backend, and finally submitted (or only dry-run).
//!
//! # Key Types
//!
//! - [`Submission`] -- one upload and the state it has reached
//! - [`Orchestrator`] -- moves submissions through lint and submit
//! - [`WorkflowService`] -- the execution backend seam
//! - [`HttpWorkflowService`] -- the backend over HTTP
//! - [`SubmissionOutcome`] -- `{workflow_id, status, details}` handed back to callers
//!
//! Rejections (bad archive, lint failure, 4xx on submit) end the submission
//! with a status. Transport failures are errors and keep the submission
//! where it was.

pub mod archive;
pub mod config;
pub mod error;
pub mod http;
pub mod service;
pub mod session;
pub mod webhook;

pub use archive::{CrateArchive, CrateSummary, UploadedWorkflow, ZIP_CONTENT_TYPES};
pub use config::ServiceConfig;
pub use error::{WorkflowError, WorkflowResult};
pub use http::HttpWorkflowService;
pub use service::{
    declared_parameters, BackendReply, SubmitRequest, WorkflowParameter, WorkflowService,
    WorkflowSummary,
};
pub use session::{
    LintedWorkflow, Orchestrator, Submission, SubmissionOutcome, SubmissionState,
    SubmissionStatus, SubmitForm, Submitter, PARAM_PREFIX,
};
pub use webhook::{placeholders, validate_webhook_url, WEBHOOK_PLACEHOLDERS};

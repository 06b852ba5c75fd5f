use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::WorkflowResult;

/// How the backend answered a check or submit call.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendReply {
    /// 2xx, with the decoded body.
    Accepted(Value),
    /// 4xx with a structured body, passed through verbatim.
    Rejected(Value),
}

impl BackendReply {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn body(&self) -> &Value {
        match self {
            Self::Accepted(body) | Self::Rejected(body) => body,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            Self::Accepted(body) | Self::Rejected(body) => body,
        }
    }
}

/// A formal parameter reported by a successful check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowParameter {
    pub name: String,
    #[serde(default, deserialize_with = "value_as_string")]
    pub value: String,
}

/// Read the `parameters` list of a check reply.
pub fn declared_parameters(check_reply: &Value) -> Vec<WorkflowParameter> {
    check_reply
        .get("parameters")
        .cloned()
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default()
}

fn value_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Everything the submit endpoint needs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmitRequest {
    pub workflow_yaml: String,
    pub title: String,
    pub description: String,
    pub submitter_name: String,
    pub submitter_id: String,
    pub license: Option<String>,
    pub keywords: Vec<String>,
    pub override_parameters: IndexMap<String, String>,
    pub dry_run: bool,
    pub force: bool,
    pub webhook_url: Option<String>,
}

impl SubmitRequest {
    /// Multipart text fields, in the order the backend documents them.
    /// Unset optional fields are left out.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let overrides = self
            .override_parameters
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join(",");
        let mut fields = vec![
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("submitterName", self.submitter_name.clone()),
            ("submitterId", self.submitter_id.clone()),
        ];
        if let Some(license) = &self.license {
            fields.push(("license", license.clone()));
        }
        fields.push(("keywords", self.keywords.join(",")));
        fields.push(("overrideParameters", overrides));
        fields.push(("dryRun", self.dry_run.to_string()));
        fields.push(("force", self.force.to_string()));
        if let Some(webhook) = &self.webhook_url {
            fields.push(("webhookURL", webhook.clone()));
        }
        fields
    }
}

const BACKEND_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn parse_backend_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, BACKEND_TIME_FORMAT).map(|t| t.and_utc())
}

fn backend_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_backend_time(&raw).map_err(serde::de::Error::custom)
}

fn optional_backend_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_backend_time(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// One entry of the backend's workflow list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    #[serde(deserialize_with = "backend_time")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "backend_time")]
    pub started_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_backend_time")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Remaining backend fields, untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl WorkflowSummary {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// The workflow execution backend.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Lint a workflow definition.
    async fn check(&self, workflow_yaml: &str) -> WorkflowResult<BackendReply>;

    /// Submit a workflow, or only validate it when `dry_run` is set.
    async fn submit(&self, request: &SubmitRequest) -> WorkflowResult<BackendReply>;

    async fn detail(&self, workflow_id: &str) -> WorkflowResult<Value>;

    async fn list(&self) -> WorkflowResult<Vec<WorkflowSummary>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_fields_encode_lists_and_flags() {
        let mut request = SubmitRequest {
            title: "Run".into(),
            keywords: vec!["a".into(), "b".into()],
            dry_run: true,
            force: true,
            ..SubmitRequest::default()
        };
        request.override_parameters.insert("text".into(), "hi".into());
        request.override_parameters.insert("n".into(), "3".into());
        let fields: IndexMap<_, _> = request.form_fields().into_iter().collect();
        assert_eq!(fields["keywords"], "a,b");
        assert_eq!(fields["overrideParameters"], "text:hi,n:3");
        assert_eq!(fields["dryRun"], "true");
        assert_eq!(fields["force"], "true");
        assert!(!fields.contains_key("license"));
        assert!(!fields.contains_key("webhookURL"));
    }

    #[test]
    fn summaries_parse_backend_timestamps() {
        let summary: WorkflowSummary = serde_json::from_value(json!({
            "workflowId": "wf-1",
            "status": "Succeeded",
            "createdAt": "2024-11-23T02:00:54Z",
            "startedAt": "2024-11-23T02:01:00Z",
            "finishedAt": null
        }))
        .unwrap();
        assert_eq!(summary.created_at.to_rfc3339(), "2024-11-23T02:00:54+00:00");
        assert!(summary.finished_at.is_none());
        assert_eq!(summary.get("status"), Some(&json!("Succeeded")));

        let bad = serde_json::from_value::<WorkflowSummary>(json!({
            "createdAt": "yesterday",
            "startedAt": "2024-11-23T02:01:00Z"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn declared_parameters_tolerate_missing_lists() {
        let reply = json!({"valid": true, "parameters": [{"name": "n", "value": 3}, {"name": "text"}]});
        assert_eq!(
            declared_parameters(&reply),
            vec![
                WorkflowParameter { name: "n".into(), value: "3".into() },
                WorkflowParameter { name: "text".into(), value: String::new() },
            ]
        );
        assert!(declared_parameters(&json!({})).is_empty());
    }
}

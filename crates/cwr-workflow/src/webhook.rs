use url::Url;

use crate::error::{WorkflowError, WorkflowResult};

/// Placeholders the backend fills in when it calls a webhook.
pub const WEBHOOK_PLACEHOLDERS: [&str; 1] = ["workflow_id"];

/// Names of the `{placeholder}` tokens in a URL template.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        found.push(&after[..end]);
        rest = &after[end + 1..];
    }
    found
}

/// Check a webhook URL template before it is handed to the backend.
///
/// Only the placeholders in [`WEBHOOK_PLACEHOLDERS`] may appear, and the
/// template must be an absolute http(s) URL once they are filled in.
pub fn validate_webhook_url(template: &str) -> WorkflowResult<()> {
    let unsupported: Vec<String> = placeholders(template)
        .into_iter()
        .filter(|name| !WEBHOOK_PLACEHOLDERS.contains(name))
        .map(str::to_string)
        .collect();
    if !unsupported.is_empty() {
        return Err(WorkflowError::UnsupportedPlaceholders(unsupported));
    }

    let filled = WEBHOOK_PLACEHOLDERS
        .iter()
        .fold(template.to_string(), |url, name| {
            url.replace(&format!("{{{name}}}"), "placeholder")
        });
    let invalid = |reason: String| WorkflowError::InvalidWebhookUrl {
        url: template.to_string(),
        reason,
    };
    let url = Url::parse(&filled).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("scheme {} is not allowed", url.scheme())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_placeholder_names() {
        assert_eq!(
            placeholders("https://x/{workflow_id}/done?s={status}"),
            vec!["workflow_id", "status"]
        );
        assert!(placeholders("https://x/plain").is_empty());
        assert!(placeholders("https://x/{open").is_empty());
    }

    #[test]
    fn workflow_id_is_the_only_placeholder() {
        assert!(validate_webhook_url("https://x/{workflow_id}").is_ok());
        assert!(validate_webhook_url("https://x/hook").is_ok());

        let err = validate_webhook_url("https://x/{unknown}").unwrap_err();
        assert!(matches!(&err, WorkflowError::UnsupportedPlaceholders(names) if names == &["unknown"]));
        assert!(err.to_string().contains("unknown"));
        assert_eq!(err.class(), cwr_types::ErrorClass::Validation);
    }

    #[test]
    fn template_must_be_an_http_url() {
        assert!(matches!(
            validate_webhook_url("ftp://x/{workflow_id}"),
            Err(WorkflowError::InvalidWebhookUrl { .. })
        ));
        assert!(validate_webhook_url("not a url").is_err());
    }
}

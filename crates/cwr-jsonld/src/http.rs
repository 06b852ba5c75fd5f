use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LINK};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{JsonLdError, JsonLdResult};
use crate::loader::{DocumentLoader, RemoteDocument};

/// Link relation of a JSON-LD context advertised via HTTP header.
pub const CONTEXT_LINK_REL: &str = "http://www.w3.org/ns/json-ld#context";

const ACCEPT_JSONLD: &str = "application/ld+json, application/json";

/// One entry of an HTTP `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValue {
    pub target: String,
    pub rel: Vec<String>,
    pub media_type: Option<String>,
}

impl LinkValue {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rel.iter().any(|r| r == rel)
    }
}

/// Parse an HTTP `Link` header into its entries.
pub fn parse_link_header(header: &str) -> Vec<LinkValue> {
    let mut links = Vec::new();
    let mut rest = header;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else { break };
        let target = after[..end].trim().to_string();
        let params_src = &after[end + 1..];

        // Parameters run until the next comma outside of quotes.
        let mut in_quotes = false;
        let mut cut = params_src.len();
        for (i, c) in params_src.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    cut = i;
                    break;
                }
                _ => {}
            }
        }
        let mut link = LinkValue {
            target,
            rel: Vec::new(),
            media_type: None,
        };
        for param in params_src[..cut].split(';') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim().to_ascii_lowercase().as_str() {
                "rel" => link.rel = value.split_whitespace().map(str::to_string).collect(),
                "type" => link.media_type = Some(value.to_string()),
                _ => {}
            }
        }
        links.push(link);
        rest = &params_src[cut..];
    }
    links
}

/// `application/json` or `application/<something>+json`.
pub(crate) fn is_json_media_type(content_type: &str) -> bool {
    let Some(sub) = content_type.strip_prefix("application/") else {
        return false;
    };
    if sub == "json" {
        return true;
    }
    match sub.strip_suffix("+json") {
        Some(stem) => stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

pub(crate) fn validate_url(raw: &str) -> JsonLdResult<Url> {
    let invalid = || JsonLdError::InvalidUrl(raw.to_string());
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid());
    }
    let host = url.host_str().ok_or_else(invalid)?;
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':'))
    {
        return Err(invalid());
    }
    Ok(url)
}

fn media_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn links(response: &Response) -> Vec<LinkValue> {
    response
        .headers()
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_link_header)
        .collect()
}

/// Loads context documents over HTTP.
///
/// Hosts that serve HTML to content negotiation but advertise their JSON-LD
/// form through an `alternate` Link header are followed to that alternate.
#[derive(Debug, Clone)]
pub struct HttpDocumentLoader {
    client: Client,
}

impl HttpDocumentLoader {
    pub fn new(timeout: Duration) -> JsonLdResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: Url) -> JsonLdResult<Response> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_JSONLD)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(JsonLdError::LoadFailed {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        Ok(response)
    }

    async fn body(url: &str, response: Response) -> JsonLdResult<Value> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| JsonLdError::LoadFailed {
            url: url.to_string(),
            reason: format!("not a JSON document: {e}"),
        })
    }
}

#[async_trait]
impl DocumentLoader for HttpDocumentLoader {
    async fn load(&self, url: &str) -> JsonLdResult<RemoteDocument> {
        let request_url = validate_url(url)?;
        debug!(%url, "loading JSON-LD document");
        let response = self.get(request_url.clone()).await?;
        let content_type = media_type(&response);
        let links = links(&response);

        let context_links: Vec<&LinkValue> =
            links.iter().filter(|l| l.has_rel(CONTEXT_LINK_REL)).collect();
        if context_links.len() > 1 {
            return Err(JsonLdError::MultipleContextLinks(url.to_string()));
        }

        if !is_json_media_type(&content_type) {
            let alternate = links.iter().find(|l| {
                l.has_rel("alternate") && l.media_type.as_deref() == Some("application/ld+json")
            });
            if let Some(alternate) = alternate {
                let alternate_url = request_url.join(&alternate.target).map_err(|e| {
                    JsonLdError::LoadFailed {
                        url: url.to_string(),
                        reason: format!("bad alternate link {}: {e}", alternate.target),
                    }
                })?;
                debug!(%url, alternate = %alternate_url, "following alternate Link header");
                let response = self.get(alternate_url.clone()).await?;
                let document = Self::body(alternate_url.as_str(), response).await?;
                return Ok(RemoteDocument {
                    document_url: alternate_url.to_string(),
                    context_url: Some(alternate.target.clone()),
                    content_type: "application/ld+json".to_string(),
                    document,
                });
            }
        }

        let document_url = response.url().to_string();
        let context_url = match context_links.first() {
            Some(link) if content_type != "application/ld+json" => request_url
                .join(&link.target)
                .ok()
                .map(|u| u.to_string()),
            _ => None,
        };
        let document = Self::body(url, response).await?;
        Ok(RemoteDocument {
            document_url,
            context_url,
            content_type,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schema_org_style_link_header() {
        let links = parse_link_header(
            "</docs/jsonldcontext.jsonld>; rel=\"alternate\"; type=\"application/ld+json\", \
             <https://ex.org/ctx>; rel=\"http://www.w3.org/ns/json-ld#context\"",
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "/docs/jsonldcontext.jsonld");
        assert!(links[0].has_rel("alternate"));
        assert_eq!(links[0].media_type.as_deref(), Some("application/ld+json"));
        assert!(links[1].has_rel(CONTEXT_LINK_REL));
    }

    #[test]
    fn quoted_commas_do_not_split_entries() {
        let links = parse_link_header("<a>; title=\"x, y\"; rel=next, <b>; rel=prev");
        assert_eq!(links.len(), 2);
        assert!(links[0].has_rel("next"));
        assert!(links[1].has_rel("prev"));
    }

    #[test]
    fn json_media_types() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("application/ld+json"));
        assert!(is_json_media_type("application/vnd_x+json"));
        assert!(!is_json_media_type("text/html"));
        assert!(!is_json_media_type("application/octet-stream"));
        assert!(!is_json_media_type("application/a.b+json"));
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://schema.org").is_ok());
        assert!(validate_url("http://localhost:8080/ctx").is_ok());
        assert!(matches!(
            validate_url("ftp://ex.org/ctx"),
            Err(JsonLdError::InvalidUrl(_))
        ));
        assert!(validate_url("https://user:pw@ex.org/").is_err());
        assert!(validate_url("relative/ctx").is_err());
    }
}

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use url::Url;

use crate::error::{JsonLdError, JsonLdResult};

/// Loaded remote contexts: URL to the `@context` value of its document.
pub type Documents = HashMap<String, Value>;

const KEYWORDS: &[&str] = &[
    "@base",
    "@container",
    "@context",
    "@direction",
    "@graph",
    "@id",
    "@import",
    "@included",
    "@index",
    "@json",
    "@language",
    "@list",
    "@nest",
    "@none",
    "@prefix",
    "@propagate",
    "@protected",
    "@reverse",
    "@set",
    "@type",
    "@value",
    "@version",
    "@vocab",
];

/// Keys of a local context that are not term definitions.
const CONTEXT_SETTINGS: &[&str] = &[
    "@base",
    "@vocab",
    "@language",
    "@version",
    "@protected",
    "@propagate",
    "@import",
    "@direction",
];

pub fn is_keyword(value: &str) -> bool {
    KEYWORDS.contains(&value)
}

/// `scheme:...` with a syntactically valid scheme.
pub fn is_absolute_iri(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn ends_with_gen_delim(iri: &str) -> bool {
    iri.ends_with([':', '/', '?', '#', '[', ']', '@'])
}

fn resolve(base: &str, relative: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(relative))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| relative.to_string())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Container {
    List,
    Set,
    Other(String),
}

/// A processed term definition.
#[derive(Clone, Debug, PartialEq)]
pub struct TermDefinition {
    /// `None` decouples the term from any IRI.
    pub iri: Option<String>,
    pub type_mapping: Option<String>,
    pub container: Option<Container>,
    /// May be used as the prefix of a compact IRI during compaction.
    pub prefix: bool,
}

impl TermDefinition {
    fn null() -> Self {
        Self {
            iri: None,
            type_mapping: None,
            container: None,
            prefix: false,
        }
    }

    pub fn is_list(&self) -> bool {
        self.container == Some(Container::List)
    }

    pub fn is_set(&self) -> bool {
        self.container == Some(Container::Set)
    }
}

/// The result of processing one or more local contexts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActiveContext {
    base: Option<String>,
    original_base: Option<String>,
    vocab: Option<String>,
    terms: BTreeMap<String, TermDefinition>,
}

impl ActiveContext {
    pub fn new(base: Option<String>) -> Self {
        Self {
            base: base.clone(),
            original_base: base,
            vocab: None,
            terms: BTreeMap::new(),
        }
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn vocab(&self) -> Option<&str> {
        self.vocab.as_deref()
    }

    pub fn term(&self, name: &str) -> Option<&TermDefinition> {
        self.terms.get(name)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&String, &TermDefinition)> {
        self.terms.iter()
    }

    /// Apply a local context (inline object, URL, list or null).
    ///
    /// Remote contexts must already be present in `documents`.
    pub fn process(&self, local: &Value, documents: &Documents) -> JsonLdResult<Self> {
        self.process_with(local, documents, &mut Vec::new())
    }

    fn process_with(
        &self,
        local: &Value,
        documents: &Documents,
        stack: &mut Vec<String>,
    ) -> JsonLdResult<Self> {
        let mut result = self.clone();
        let items: Vec<&Value> = match local {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for item in items {
            match item {
                Value::Null => result = ActiveContext::new(self.original_base.clone()),
                Value::String(url) => {
                    let url = match &result.base {
                        Some(base) if !is_absolute_iri(url) => resolve(base, url),
                        _ => url.clone(),
                    };
                    if stack.contains(&url) {
                        return Err(JsonLdError::RecursiveContext(url));
                    }
                    let remote = documents
                        .get(&url)
                        .ok_or_else(|| JsonLdError::ContextNotLoaded(url.clone()))?;
                    stack.push(url);
                    result = result.process_with(remote, documents, stack)?;
                    stack.pop();
                }
                Value::Object(map) => result.apply_local(map, !stack.is_empty())?,
                other => {
                    return Err(JsonLdError::InvalidContext(format!(
                        "unexpected context entry {other}"
                    )))
                }
            }
        }
        Ok(result)
    }

    fn apply_local(&mut self, map: &Map<String, Value>, remote: bool) -> JsonLdResult<()> {
        // @base is ignored inside remote contexts.
        if !remote {
            match map.get("@base") {
                None => {}
                Some(Value::Null) => self.base = None,
                Some(Value::String(b)) => {
                    self.base = Some(match &self.base {
                        Some(current) if !is_absolute_iri(b) => resolve(current, b),
                        _ => b.clone(),
                    })
                }
                Some(_) => {
                    return Err(JsonLdError::InvalidKeywordValue {
                        keyword: "@base",
                        reason: "must be a string or null".into(),
                    })
                }
            }
        }
        match map.get("@vocab") {
            None => {}
            Some(Value::Null) => self.vocab = None,
            Some(Value::String(v)) => {
                self.vocab = Some(match &self.base {
                    Some(base) if !is_absolute_iri(v) && !v.starts_with("_:") => resolve(base, v),
                    _ => v.clone(),
                })
            }
            Some(_) => {
                return Err(JsonLdError::InvalidKeywordValue {
                    keyword: "@vocab",
                    reason: "must be a string or null".into(),
                })
            }
        }

        let mut builder = TermBuilder {
            active: self,
            local: map,
            defined: HashMap::new(),
        };
        for key in map.keys() {
            if CONTEXT_SETTINGS.contains(&key.as_str()) {
                continue;
            }
            builder.create(key)?;
        }
        Ok(())
    }

    /// Expand a term, compact IRI or relative IRI.
    ///
    /// `vocab` allows term and `@vocab` expansion; `document_relative`
    /// resolves against the base. Returns `None` for null-mapped terms and
    /// unknown keyword-like strings.
    pub fn expand_iri(&self, value: &str, vocab: bool, document_relative: bool) -> Option<String> {
        if is_keyword(value) {
            return Some(value.to_string());
        }
        if value.starts_with('@') {
            return None;
        }
        if vocab {
            if let Some(def) = self.terms.get(value) {
                return def.iri.clone();
            }
        }
        if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix == "_" || suffix.starts_with("//") {
                return Some(value.to_string());
            }
            if let Some(iri) = self.terms.get(prefix).and_then(|d| d.iri.as_ref()) {
                return Some(format!("{iri}{suffix}"));
            }
            if is_absolute_iri(value) {
                return Some(value.to_string());
            }
        }
        if vocab {
            if let Some(v) = &self.vocab {
                return Some(format!("{v}{value}"));
            }
        }
        if document_relative {
            if let Some(base) = &self.base {
                return Some(resolve(base, value));
            }
        }
        Some(value.to_string())
    }
}

/// Creates term definitions of one local context, resolving dependencies
/// between its terms on demand.
struct TermBuilder<'a> {
    active: &'a mut ActiveContext,
    local: &'a Map<String, Value>,
    defined: HashMap<String, bool>,
}

impl TermBuilder<'_> {
    fn invalid(term: &str, reason: &str) -> JsonLdError {
        JsonLdError::InvalidTermDefinition {
            term: term.to_string(),
            reason: reason.to_string(),
        }
    }

    fn create(&mut self, term: &str) -> JsonLdResult<()> {
        match self.defined.get(term) {
            Some(true) => return Ok(()),
            Some(false) => return Err(JsonLdError::CyclicIriMapping(term.to_string())),
            None => {}
        }
        if term.starts_with('@') {
            self.defined.insert(term.to_string(), true);
            return Ok(());
        }
        self.defined.insert(term.to_string(), false);
        self.active.terms.remove(term);

        let value = self.local.get(term).cloned().unwrap_or(Value::Null);
        let (definition, simple) = match value {
            Value::Null => {
                self.active.terms.insert(term.to_string(), TermDefinition::null());
                self.defined.insert(term.to_string(), true);
                return Ok(());
            }
            Value::String(iri) => {
                let mut map = Map::new();
                map.insert("@id".into(), Value::String(iri));
                (map, true)
            }
            Value::Object(map) => (map, false),
            _ => return Err(Self::invalid(term, "must be a string, object or null")),
        };

        if definition.contains_key("@reverse") {
            tracing::debug!(term, "skipping reverse property definition");
            self.defined.insert(term.to_string(), true);
            return Ok(());
        }

        let type_mapping = match definition.get("@type") {
            None => None,
            Some(Value::String(t)) => match self.expand_iri(t, true, false)? {
                Some(e)
                    if matches!(e.as_str(), "@id" | "@vocab" | "@json" | "@none")
                        || is_absolute_iri(&e) =>
                {
                    Some(e)
                }
                _ => return Err(Self::invalid(term, "invalid type mapping")),
            },
            Some(_) => return Err(Self::invalid(term, "@type must be a string")),
        };

        let iri = match definition.get("@id") {
            Some(Value::Null) => None,
            Some(Value::String(id)) if id != term => match self.expand_iri(id, true, false)? {
                Some(e) if is_keyword(&e) || is_absolute_iri(&e) || e.starts_with("_:") => Some(e),
                _ => return Err(Self::invalid(term, "invalid IRI mapping")),
            },
            Some(Value::String(_)) | None => Some(self.implicit_iri(term)?),
            Some(_) => return Err(Self::invalid(term, "@id must be a string or null")),
        };

        let container = match definition.get("@container") {
            None | Some(Value::Null) => None,
            Some(Value::String(c)) => Some(parse_container(c)),
            Some(Value::Array(cs)) => cs
                .iter()
                .filter_map(Value::as_str)
                .map(parse_container)
                .min_by_key(|c| match c {
                    Container::List => 0,
                    Container::Set => 1,
                    Container::Other(_) => 2,
                }),
            Some(_) => return Err(Self::invalid(term, "invalid container mapping")),
        };

        let prefix = match definition.get("@prefix") {
            Some(Value::Bool(p)) => *p,
            _ => {
                simple
                    && !term.contains(':')
                    && !term.contains('/')
                    && iri.as_deref().is_some_and(ends_with_gen_delim)
            }
        };

        self.active.terms.insert(
            term.to_string(),
            TermDefinition {
                iri,
                type_mapping,
                container,
                prefix,
            },
        );
        self.defined.insert(term.to_string(), true);
        Ok(())
    }

    fn implicit_iri(&mut self, term: &str) -> JsonLdResult<String> {
        if let Some((prefix, suffix)) = term.split_once(':') {
            if prefix != "_" && !suffix.starts_with("//") && self.local.contains_key(prefix) {
                self.create(prefix)?;
            }
            if let Some(iri) = self.active.terms.get(prefix).and_then(|d| d.iri.as_ref()) {
                return Ok(format!("{iri}{suffix}"));
            }
            return Ok(term.to_string());
        }
        if term.contains('/') {
            return Ok(term.to_string());
        }
        match &self.active.vocab {
            Some(vocab) => Ok(format!("{vocab}{term}")),
            None => Err(Self::invalid(term, "no IRI mapping and no @vocab")),
        }
    }

    fn expand_iri(
        &mut self,
        value: &str,
        vocab: bool,
        document_relative: bool,
    ) -> JsonLdResult<Option<String>> {
        if is_keyword(value) {
            return Ok(Some(value.to_string()));
        }
        if value.starts_with('@') {
            return Ok(None);
        }
        if self.local.contains_key(value) && self.defined.get(value) != Some(&true) {
            self.create(value)?;
        }
        if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix != "_"
                && !suffix.starts_with("//")
                && self.local.contains_key(prefix)
                && self.defined.get(prefix) != Some(&true)
            {
                self.create(prefix)?;
            }
        }
        Ok(self.active.expand_iri(value, vocab, document_relative))
    }
}

fn parse_container(value: &str) -> Container {
    match value {
        "@list" => Container::List,
        "@set" => Container::Set,
        other => Container::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn process(local: Value) -> ActiveContext {
        ActiveContext::default()
            .process(&local, &Documents::new())
            .unwrap()
    }

    #[test]
    fn simple_terms_and_prefixes() {
        let ctx = process(json!({
            "schema": "http://schema.org/",
            "name": "schema:name",
            "author": {"@id": "schema:author", "@type": "@id"},
            "parts": {"@id": "http://schema.org/hasPart", "@container": "@set"}
        }));
        assert_eq!(ctx.term("name").unwrap().iri.as_deref(), Some("http://schema.org/name"));
        assert!(ctx.term("schema").unwrap().prefix);
        assert!(!ctx.term("name").unwrap().prefix);
        let author = ctx.term("author").unwrap();
        assert_eq!(author.type_mapping.as_deref(), Some("@id"));
        assert!(ctx.term("parts").unwrap().is_set());
    }

    #[test]
    fn vocab_expands_unknown_terms() {
        let ctx = process(json!({"@vocab": "http://schema.org/"}));
        assert_eq!(
            ctx.expand_iri("Dataset", true, false).as_deref(),
            Some("http://schema.org/Dataset")
        );
        assert_eq!(ctx.expand_iri("cwr/abc", false, true).as_deref(), Some("cwr/abc"));
    }

    #[test]
    fn base_resolves_document_relative_iris() {
        let ctx = process(json!({"@base": "https://ex.org/data/"}));
        assert_eq!(
            ctx.expand_iri("file.csv", false, true).as_deref(),
            Some("https://ex.org/data/file.csv")
        );
    }

    #[test]
    fn null_mapping_drops_term() {
        let ctx = process(json!([{"@vocab": "http://ex.org/"}, {"secret": null}]));
        assert_eq!(ctx.expand_iri("secret", true, false), None);
    }

    #[test]
    fn remote_contexts_come_from_documents() {
        let mut docs = Documents::new();
        docs.insert(
            "http://ex.org/ctx".into(),
            json!({"@base": "http://ignored.org/", "name": "http://ex.org/name"}),
        );
        let ctx = ActiveContext::default()
            .process(&json!("http://ex.org/ctx"), &docs)
            .unwrap();
        assert!(ctx.term("name").is_some());
        assert_eq!(ctx.base(), None);

        let err = ActiveContext::default()
            .process(&json!("http://ex.org/other"), &docs)
            .unwrap_err();
        assert!(matches!(err, JsonLdError::ContextNotLoaded(_)));
    }

    #[test]
    fn self_including_context_is_rejected() {
        let mut docs = Documents::new();
        docs.insert("http://ex.org/loop".into(), json!("http://ex.org/loop"));
        let err = ActiveContext::default()
            .process(&json!("http://ex.org/loop"), &docs)
            .unwrap_err();
        assert!(matches!(err, JsonLdError::RecursiveContext(_)));
    }

    #[test]
    fn cyclic_terms_are_rejected() {
        let err = ActiveContext::default()
            .process(&json!({"a": "b:x", "b": "a:y"}), &Documents::new())
            .unwrap_err();
        assert!(matches!(err, JsonLdError::CyclicIriMapping(_)));
    }

    #[test]
    fn absolute_iri_detection() {
        assert!(is_absolute_iri("http://schema.org/name"));
        assert!(is_absolute_iri("urn:uuid:1234"));
        assert!(!is_absolute_iri("cwr/abc"));
        assert!(!is_absolute_iri("1abc:def"));
    }
}

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Persistent identifier of an object in the object store (e.g. `cwr/2b40…`).
///
/// Identifiers are opaque strings. The store's [`IdPrefix`] decides which
/// strings inside an object are references to other objects.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap a raw identifier string without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Archive file name for a download of this object.
    ///
    /// Path segments after the first one are joined with `_`, so
    /// `cwr/abc` becomes `abc.zip`.
    pub fn archive_name(&self) -> String {
        let rest: Vec<&str> = self.0.split('/').skip(1).collect();
        if rest.is_empty() {
            format!("{}.zip", self.0)
        } else {
            format!("{}.zip", rest.join("_"))
        }
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier prefix configured for the object store. Always ends with `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IdPrefix(String);

impl IdPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `value` is a reference into the store.
    pub fn matches(&self, value: &str) -> bool {
        value.len() > self.0.len() && value.starts_with(&self.0)
    }

    /// Parse and validate a user-supplied identifier.
    pub fn parse_id(&self, raw: &str) -> Result<ObjectId, TypeError> {
        if raw.is_empty() {
            return Err(TypeError::InvalidIdentifier {
                id: raw.to_string(),
                reason: "identifier is empty".into(),
            });
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidIdentifier {
                id: raw.to_string(),
                reason: "identifier contains whitespace or control characters".into(),
            });
        }
        if !self.matches(raw) {
            return Err(TypeError::InvalidIdentifier {
                id: raw.to_string(),
                reason: format!("identifier must start with {}", self.0),
            });
        }
        Ok(ObjectId::new(raw))
    }
}

impl Default for IdPrefix {
    fn default() -> Self {
        Self::new("cwr/")
    }
}

impl From<String> for IdPrefix {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<IdPrefix> for String {
    fn from(p: IdPrefix) -> Self {
        p.0
    }
}

impl fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

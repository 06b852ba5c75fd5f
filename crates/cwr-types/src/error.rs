use std::fmt;

use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("object is missing {0}")]
    MissingField(&'static str),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}

/// Caller-facing failure classes.
///
/// Every crate error maps onto exactly one class so that outer layers can
/// decide how to surface it without matching on crate-specific variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// User input defect. Never retried.
    Validation,
    /// A remote backend declined the request; its details are passed through.
    UpstreamRejection,
    /// A remote backend was unreachable or answered unexpectedly.
    Transport,
    /// The object does not exist or is not visible to the caller.
    NotFound,
    /// A broken invariant inside the pipeline. Treated as a bug.
    Internal,
}

impl ErrorClass {
    /// Stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_failure",
            Self::UpstreamRejection => "upstream_rejection",
            Self::Transport => "transport_failure",
            Self::NotFound => "not_found",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TypeError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_are_stable() {
        assert_eq!(ErrorClass::Validation.as_str(), "validation_failure");
        assert_eq!(ErrorClass::Transport.to_string(), "transport_failure");
        assert_eq!(ErrorClass::Internal.to_string(), "internal_error");
    }

    #[test]
    fn type_errors_are_validation_failures() {
        let err = TypeError::MissingField("@id");
        assert_eq!(err.class(), ErrorClass::Validation);
        assert_eq!(err.to_string(), "object is missing @id");
    }
}

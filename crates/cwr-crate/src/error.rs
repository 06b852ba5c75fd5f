use cwr_types::{ErrorClass, ObjectId};

/// Errors raised while projecting a graph into a crate.
#[derive(Debug, thiserror::Error)]
pub enum CrateError {
    /// A workflow crate was requested for a dataset without `mainEntity`.
    #[error("no mainEntity found in dataset {0}")]
    MissingMainEntity(ObjectId),

    #[error("missing remote URL for {role} {id}")]
    MissingRemoteUrl { id: String, role: &'static str },

    #[error("root dataset {0} is not part of the graph")]
    RootMissing(ObjectId),

    /// A reference survived the rewrite pass without a target entity.
    #[error("entity {entity} references {target}, which is not in the crate")]
    DanglingReference { entity: String, target: String },

    #[error("rendering the crate preview failed: {0}")]
    Preview(#[from] minijinja::Error),
}

impl CrateError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingMainEntity(_) | Self::MissingRemoteUrl { .. } => ErrorClass::Validation,
            Self::RootMissing(_) => ErrorClass::NotFound,
            Self::DanglingReference { .. } | Self::Preview(_) => ErrorClass::Internal,
        }
    }
}

/// Result alias for crate operations.
pub type CrateResult<T> = Result<T, CrateError>;

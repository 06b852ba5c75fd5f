use cwr_store::StoreError;
use cwr_types::{ErrorClass, ObjectId};

/// Errors from graph resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    /// The repository answered but the root object was not part of it.
    #[error("root object {0} is not part of the resolved graph")]
    RootMissing(ObjectId),

    /// References were still outstanding after the last permitted round.
    #[error(
        "maximum recursion depth {max_depth} reached while resolving {root}: \
         {unresolved} references outstanding"
    )]
    DepthExceeded {
        root: ObjectId,
        max_depth: usize,
        unresolved: usize,
    },
}

impl ResolveError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Store(e) => e.class(),
            Self::RootMissing(_) => ErrorClass::NotFound,
            Self::DepthExceeded { .. } => ErrorClass::Internal,
        }
    }
}

/// Result alias for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

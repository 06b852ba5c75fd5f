use std::path::PathBuf;

use cwr_crate::CrateError;
use cwr_types::ErrorClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("payload file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("unsupported payload source for {entity}: {reason}")]
    UnsupportedSource { entity: String, reason: String },

    #[error("file {0} has a payload but no path inside the crate")]
    NoArchivePath(String),

    #[error("in-memory payload of {0} was already consumed")]
    ReaderConsumed(String),

    #[error("zip entry {0} is still open")]
    EntryAlreadyOpen(String),

    #[error("no zip entry is open")]
    NoOpenEntry,

    #[error("{0} exceeds the 4 GiB zip limit")]
    TooLarge(String),

    #[error("remote payload {url} answered {status}")]
    RemoteStatus { url: String, status: u16 },

    #[error("fetching remote payload failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serializing crate metadata failed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(transparent)]
    Crate(#[from] CrateError),
}

impl PackError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::FileNotFound(_) => ErrorClass::NotFound,
            Self::TooLarge(_) => ErrorClass::Validation,
            Self::RemoteStatus { .. } | Self::Http(_) => ErrorClass::Transport,
            Self::Crate(e) => e.class(),
            Self::UnsupportedSource { .. }
            | Self::NoArchivePath(_)
            | Self::ReaderConsumed(_)
            | Self::EntryAlreadyOpen(_)
            | Self::NoOpenEntry
            | Self::Io(_)
            | Self::Metadata(_) => ErrorClass::Internal,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;

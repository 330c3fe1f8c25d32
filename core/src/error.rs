use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by index construction, index access and query execution.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The index at `path` is missing, incomplete or corrupt. A server must not
    /// start serving against it.
    #[error("index at {path} cannot be opened: {reason}")]
    StartupFatal { path: PathBuf, reason: String },

    /// Two documents in one build share an identifier. The build is aborted.
    #[error("duplicate document identifier: {0}")]
    DuplicateIdentifier(String),

    /// A query variant produced no tokens and was dropped.
    #[error("query variant has no searchable tokens: {0:?}")]
    MalformedVariant(String),

    /// A stored document was requested but does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Another builder holds the lock for this destination. A lock left behind
    /// by a killed build has to be removed by hand.
    #[error("another build holds the lock {}; if no build is running, delete that file and retry", .0.display())]
    BuildLocked(PathBuf),

    /// On-disk data failed to decode after the index was opened.
    #[error("corrupt index data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub fn startup_fatal(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SearchError::StartupFatal { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

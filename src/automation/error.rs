use crate::locator::LocateError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an external collaborator (capture, input, fetch, storage).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("UI action '{action}' failed: {description}")]
    UiAction { action: String, description: String },

    #[error("Fetching posts failed: {0}")]
    Fetch(String),

    #[error("Post payload is not valid JSON: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name for {path:?} after {attempts} attempts")]
    NameExhausted { path: PathBuf, attempts: u32 },
}

/// A specialized `Result` type for batch runs.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Conditions that stop a whole batch. Per-item failures are not errors:
/// the item is skipped and the batch continues.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Could not load reference icon: {0}")]
    Reference(#[from] LocateError),

    #[error("Could not obtain posts: {0}")]
    Posts(#[source] ServiceError),
}

//! Error type for git operations.

use thiserror::Error;

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Path error: {0}")]
    Path(String),
    #[error("Push rejected for {reference}: {message}")]
    PushRejected { reference: String, message: String },
    #[error("Git task failed: {0}")]
    Task(String),
}

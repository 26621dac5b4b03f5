//! Git publishing for consuldiff.
//!
//! Snapshot files are committed to a local repository and pushed to a remote
//! so every poll that changed the KV store leaves an entry in history.

mod error;
mod publisher;

pub use error::{GitError, GitResult};
pub use publisher::{
    GitPublisher, GitSettings, DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, DEFAULT_COMMIT_MESSAGE,
};

use async_trait::async_trait;
use std::path::PathBuf;

/// Result of one publish call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    /// Short id of the commit created, if the files changed.
    pub commit: Option<String>,
    /// Whether the branch was pushed to a remote.
    pub pushed: bool,
}

impl PublishOutcome {
    /// Nothing new was committed.
    pub fn is_unchanged(&self) -> bool {
        self.commit.is_none()
    }
}

/// Replicates persisted snapshot files somewhere durable.
///
/// Publishing the same content twice must be a no-op, not an error.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the given files, relative to the publisher's root.
    async fn publish(&self, paths: &[PathBuf]) -> GitResult<PublishOutcome>;
}

use std::sync::Arc;

use thiserror::Error;

use crate::repo::{CommitRecord, RepositoryConfig};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("repository access failed: {0}")]
    Access(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HistoryError {
    pub fn access<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HistoryError::Access(Box::new(err))
    }
}

/// Capability interface over one repository's commit graph.
///
/// The core never touches a repository directly; any concrete backing
/// (libgit2 binding, subprocess, protocol client) satisfies this trait.
/// Implementations are called from blocking sections, so all operations
/// are synchronous.
pub trait HistoryProvider: Send + Sync {
    /// Contact the remote and bring local refs up to date.
    fn refresh(&self) -> Result<(), HistoryError>;

    /// Current tip of the tracked branch.
    fn tip(&self, branch: &str) -> Result<CommitRecord, HistoryError>;

    /// Ancestry walk from the branch tip toward the root, newest first,
    /// yielding at most `limit` commits.
    fn ancestry(&self, branch: &str, limit: usize) -> Result<Vec<CommitRecord>, HistoryError>;

    /// Resolve a hex prefix to a single commit. Unknown or ambiguous
    /// prefixes resolve to `None`, never an error.
    fn resolve_prefix(&self, prefix: &str) -> Result<Option<CommitRecord>, HistoryError>;
}

/// Constructs the provider for one repository, cloning on first contact
/// if the backing requires local state.
pub trait ProviderFactory: Send + Sync {
    fn open(&self, config: &RepositoryConfig) -> Result<Arc<dyn HistoryProvider>, HistoryError>;
}

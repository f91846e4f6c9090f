use async_trait::async_trait;

use crate::domain::{DomainError, FileChange};

/// A checked-out or cloned working tree, ready for enumeration.
#[derive(Debug, Clone)]
pub struct WorkingTree {
    pub local_path: String,
    pub resolved_commit: String,
}

/// Source-control access: cloning a remote into a local working tree and
/// diffing two commits for the incremental indexer.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Clones `url` into a managed temp directory (or opens it in place if
    /// `url` is already a local path) and resolves `HEAD` to a commit SHA.
    async fn clone_or_open(&self, url: &str) -> Result<WorkingTree, DomainError>;

    /// Resolves the working tree's current `HEAD` to a commit SHA without
    /// re-cloning.
    async fn resolve_head(&self, local_path: &str) -> Result<String, DomainError>;

    /// File-level changes between two commits, with rename detection
    /// (~50% similarity threshold).
    async fn diff(
        &self,
        local_path: &str,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<Vec<FileChange>, DomainError>;
}

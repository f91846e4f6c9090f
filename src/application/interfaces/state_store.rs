use async_trait::async_trait;

use crate::domain::{DomainError, RepositoryIndexState};

/// Durable commit watermark, one row per `repository_url`. Concurrent writes
/// to the same URL are serialized by the implementation; writes to distinct
/// URLs proceed independently.
#[async_trait]
pub trait RepositoryIndexStateStore: Send + Sync {
    async fn get(&self, repository_url: &str) -> Result<Option<RepositoryIndexState>, DomainError>;

    async fn put(&self, state: RepositoryIndexState) -> Result<(), DomainError>;

    async fn exists(&self, repository_url: &str) -> Result<bool, DomainError>;

    async fn delete(&self, repository_url: &str) -> Result<bool, DomainError>;
}

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::application::{LexicalIndex, RepositoryIndexStateStore, RepositoryRepository, VectorIndex};
use crate::domain::DomainError;

pub struct DeleteRepositoryUseCase {
    repository_repo: Arc<dyn RepositoryRepository>,
    lexical_index: Arc<dyn LexicalIndex>,
    vector_index: Arc<dyn VectorIndex>,
    state_store: Arc<dyn RepositoryIndexStateStore>,
}

impl DeleteRepositoryUseCase {
    pub fn new(
        repository_repo: Arc<dyn RepositoryRepository>,
        lexical_index: Arc<dyn LexicalIndex>,
        vector_index: Arc<dyn VectorIndex>,
        state_store: Arc<dyn RepositoryIndexStateStore>,
    ) -> Self {
        Self {
            repository_repo,
            lexical_index,
            vector_index,
            state_store,
        }
    }

    pub async fn execute(&self, id: &str) -> Result<(), DomainError> {
        let repo = self
            .repository_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("repository not found: {id}")))?;

        info!("deleting repository: {} ({})", repo.name(), repo.path());

        self.lexical_index.remove_by_repository(repo.name()).await?;
        self.vector_index.delete_by_repository(repo.name()).await?;
        self.repository_repo.delete(id).await?;
        self.state_store.delete(repo.path()).await?;

        info!("repository deleted");

        Ok(())
    }

    pub async fn delete_by_path(&self, path: &str) -> Result<(), DomainError> {
        let canonical_path = Path::new(path)
            .canonicalize()
            .map_err(|e| DomainError::validation(format!("invalid path '{path}': {e}")))?
            .to_string_lossy()
            .to_string();

        let repo = self
            .repository_repo
            .find_by_path(&canonical_path)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("repository not found at path: {path}")))?;

        self.execute(repo.id()).await
    }
}

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::use_cases::index_repository::{index_chunks, send};
use crate::application::{
    CodeParser, Embedder, IndexRepositoryUseCase, LexicalIndex, RepositoryIndexStateStore,
    RepositoryRepository, RepositorySource, VectorIndex,
};
use crate::domain::{
    Chunk, DomainError, FileChange, Language, ProgressEvent, Repository, RepositoryIndexState,
    Stage,
};

const DEFAULT_BATCH_SIZE: usize = 1000;

/// Incremental pass over a previously-indexed repository: diffs against the
/// last committed watermark and applies only the changed files.
pub struct IncrementalIndexUseCase {
    repository_source: Arc<dyn RepositorySource>,
    parsers: Vec<Arc<dyn CodeParser>>,
    lexical_index: Arc<dyn LexicalIndex>,
    vector_index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    state_store: Arc<dyn RepositoryIndexStateStore>,
    repository_repo: Arc<dyn RepositoryRepository>,
    full_index: Arc<IndexRepositoryUseCase>,
    batch_size: usize,
}

impl IncrementalIndexUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_source: Arc<dyn RepositorySource>,
        parsers: Vec<Arc<dyn CodeParser>>,
        lexical_index: Arc<dyn LexicalIndex>,
        vector_index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        state_store: Arc<dyn RepositoryIndexStateStore>,
        repository_repo: Arc<dyn RepositoryRepository>,
        full_index: Arc<IndexRepositoryUseCase>,
    ) -> Self {
        Self {
            repository_source,
            parsers,
            lexical_index,
            vector_index,
            embedder,
            state_store,
            repository_repo,
            full_index,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    fn parser_for(&self, language: Language) -> Option<&Arc<dyn CodeParser>> {
        self.parsers.iter().find(|p| p.supports(language))
    }

    pub async fn execute(
        &self,
        repository_url: &str,
        cancellation: CancellationToken,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<Repository, DomainError> {
        let tree = self.repository_source.clone_or_open(repository_url).await?;

        let Some(state) = self.state_store.get(repository_url).await? else {
            info!("no prior index state for {repository_url}, falling back to full ingestion");
            return self
                .full_index
                .execute(repository_url, None, cancellation, progress)
                .await;
        };

        let existing_repository = self
            .repository_repo
            .find_by_path(&tree.local_path)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("no repository catalog entry for {}", tree.local_path))
            })?;

        send(&progress, Stage::Parsing, "diffing against last indexed commit", 0).await;

        let mut changes = self
            .repository_source
            .diff(&tree.local_path, state.last_indexed_commit(), &tree.resolved_commit)
            .await?;
        changes.sort_by_key(FileChange::apply_priority);

        if changes.is_empty() {
            send(&progress, Stage::Complete, "no changes since last index", 100).await;
            return Ok(existing_repository);
        }

        let repo_path = Path::new(&tree.local_path);
        let repository_name = existing_repository.name().to_string();
        let total_changes = changes.len().max(1);
        let mut files_processed = 0u64;
        let mut new_chunks: Vec<Chunk> = Vec::new();
        let mut chunk_delta: i64 = 0;

        for (index, change) in changes.iter().enumerate() {
            if cancellation.is_cancelled() {
                send(&progress, Stage::Failed, "cancelled during incremental apply", 100).await;
                return Err(DomainError::Cancelled);
            }

            if let Some(removal_path) = change.removal_path() {
                self.lexical_index
                    .remove_by_file(&repository_name, removal_path)
                    .await?;
                self.vector_index
                    .delete_by_file(&repository_name, removal_path)
                    .await?;
            }

            if let Some(addition_path) = change.addition_path() {
                let absolute = repo_path.join(addition_path);
                let language = Language::from_path(&absolute);
                match self.parser_for(language) {
                    Some(parser) => match tokio::fs::read_to_string(&absolute).await {
                        Ok(content) => match parser.parse(&repository_name, addition_path, &content, language) {
                            Ok(chunks) => {
                                chunk_delta += chunks.len() as i64;
                                new_chunks.extend(chunks);
                                files_processed += 1;
                            }
                            Err(e) => warn!("failed to parse {}: {}", addition_path, e),
                        },
                        Err(e) => warn!("failed to read {}: {}", addition_path, e),
                    },
                    None => continue,
                }
            } else {
                files_processed += 1;
            }

            if (index + 1) % (total_changes / 5).max(1) == 0 || index + 1 == total_changes {
                let pct = (((index + 1) as f64 / total_changes as f64) * 100.0) as u8;
                send(
                    &progress,
                    Stage::Indexing,
                    format!("applied {}/{} changes", index + 1, total_changes),
                    pct,
                )
                .await;
            }
        }

        index_chunks(
            self.lexical_index.as_ref(),
            self.embedder.as_ref(),
            self.vector_index.as_ref(),
            &new_chunks,
            self.batch_size,
            &progress,
            &cancellation,
        )
        .await?;

        if files_processed == 0 {
            send(&progress, Stage::Complete, "no files processed successfully", 100).await;
            return Ok(existing_repository);
        }

        let previous_chunk_count = existing_repository.chunk_count() as i64;
        let new_chunk_count = (previous_chunk_count + chunk_delta).max(0) as u64;
        self.repository_repo
            .update_stats(existing_repository.id(), new_chunk_count, existing_repository.file_count())
            .await?;

        self.state_store
            .put(RepositoryIndexState::new(
                repository_url.to_string(),
                tree.resolved_commit.clone(),
            ))
            .await?;

        send(
            &progress,
            Stage::Complete,
            format!("incremental pass applied {files_processed} files"),
            100,
        )
        .await;

        self.repository_repo
            .find_by_id(existing_repository.id())
            .await?
            .ok_or_else(|| DomainError::internal("repository vanished during incremental indexing"))
    }
}

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ignore::WalkBuilder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::{
    CodeParser, Embedder, LexicalIndex, RepositoryIndexStateStore, RepositoryRepository,
    RepositorySource, VectorIndex,
};
use crate::domain::{
    Chunk, DomainError, Language, ProgressEvent, Repository, RepositoryIndexState, Stage,
    VectorStore,
};

const DEFAULT_BATCH_SIZE: usize = 1000;
/// Non-source files above this size are skipped rather than parsed.
const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;
/// Retry budget for a batch-level `IndexWriteError`: 1s, 2s, then escalate.
const MAX_WRITE_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Retries `operation` while it returns a retryable `DomainError`, backing
/// off exponentially from `INITIAL_BACKOFF`, up to `MAX_WRITE_ATTEMPTS`
/// attempts total. Non-retryable errors and the final attempt's error are
/// propagated immediately.
async fn with_retry<F, Fut, T>(operation: F) -> Result<T, DomainError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut attempt = 1;
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                warn!(
                    "retrying index write after attempt {}/{}: {}",
                    attempt, MAX_WRITE_ATTEMPTS, e
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Full ingestion pass: clone-or-open, enumerate, parse, batch-index, commit
/// the resulting `RepositoryIndexState`.
pub struct IndexRepositoryUseCase {
    repository_source: Arc<dyn RepositorySource>,
    parsers: Vec<Arc<dyn CodeParser>>,
    lexical_index: Arc<dyn LexicalIndex>,
    vector_index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    state_store: Arc<dyn RepositoryIndexStateStore>,
    repository_repo: Arc<dyn RepositoryRepository>,
    batch_size: usize,
}

impl IndexRepositoryUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_source: Arc<dyn RepositorySource>,
        parsers: Vec<Arc<dyn CodeParser>>,
        lexical_index: Arc<dyn LexicalIndex>,
        vector_index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        state_store: Arc<dyn RepositoryIndexStateStore>,
        repository_repo: Arc<dyn RepositoryRepository>,
    ) -> Self {
        Self {
            repository_source,
            parsers,
            lexical_index,
            vector_index,
            embedder,
            state_store,
            repository_repo,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn parser_for(&self, language: Language) -> Option<&Arc<dyn CodeParser>> {
        self.parsers.iter().find(|p| p.supports(language))
    }

    /// Runs the pass, sending `ProgressEvent`s to `progress` as it goes. The
    /// caller is expected to drain the channel concurrently with awaiting
    /// this future, not after it resolves.
    pub async fn execute(
        &self,
        repository_url: &str,
        name: Option<&str>,
        cancellation: CancellationToken,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<Repository, DomainError> {
        send(&progress, Stage::Cloning, "resolving working tree", 0).await;
        let tree = self.repository_source.clone_or_open(repository_url).await?;

        if cancellation.is_cancelled() {
            send(&progress, Stage::Failed, "cancelled during clone", 100).await;
            return Err(DomainError::Cancelled);
        }

        let repo_path = Path::new(&tree.local_path);
        let repo_name = name.map(String::from).unwrap_or_else(|| {
            repo_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string()
        });

        send(&progress, Stage::Parsing, "enumerating files", 0).await;
        let files = enumerate_files(repo_path);
        let total = files.len().max(1) as f64;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut files_attempted = 0u64;
        let mut files_succeeded = 0u64;

        for (index, entry) in files.iter().enumerate() {
            if cancellation.is_cancelled() {
                send(&progress, Stage::Failed, "cancelled during parsing", 100).await;
                return Err(DomainError::Cancelled);
            }

            let language = Language::from_path(entry);
            let Some(parser) = self.parser_for(language) else {
                continue;
            };

            files_attempted += 1;
            let relative = entry
                .strip_prefix(repo_path)
                .unwrap_or(entry)
                .to_string_lossy()
                .to_string();

            let content = match tokio::fs::read_to_string(entry).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("failed to read {}: {}", relative, e);
                    continue;
                }
            };

            match parser.parse(&repo_name, &relative, &content, language) {
                Ok(mut file_chunks) => {
                    files_succeeded += 1;
                    chunks.append(&mut file_chunks);
                }
                Err(e) => warn!("failed to parse {}: {}", relative, e),
            }

            let pct = (((index + 1) as f64 / total) * 100.0) as u8;
            send(&progress, Stage::Parsing, format!("parsed {relative}"), pct).await;
        }

        send(&progress, Stage::Indexing, "indexing chunks", 0).await;
        index_chunks(
            self.lexical_index.as_ref(),
            self.embedder.as_ref(),
            self.vector_index.as_ref(),
            &chunks,
            self.batch_size,
            &progress,
            &cancellation,
        )
        .await?;

        let repository = Repository::new_with_storage(
            repo_name,
            tree.local_path.clone(),
            VectorStore::default(),
            None,
        );
        self.repository_repo.save(&repository).await?;
        self.repository_repo
            .update_stats(repository.id(), chunks.len() as u64, files_succeeded)
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
            format!(
                "indexed {files_succeeded}/{files_attempted} files, {} chunks",
                chunks.len()
            ),
            100,
        )
        .await;

        info!(
            "indexed {} ({} files, {} chunks)",
            repository.name(),
            files_succeeded,
            chunks.len()
        );

        self.repository_repo
            .find_by_id(repository.id())
            .await?
            .ok_or_else(|| DomainError::internal("repository vanished immediately after indexing"))
    }
}

/// Batches `chunks` through the lexical index, embedder, and vector index.
/// Shared by full and incremental indexing. A chunk whose embedding batch
/// failed is still written to the lexical index, and simply has no vector
/// counterpart (the caller already marked it `lexical_only` if desired).
pub(crate) async fn index_chunks(
    lexical_index: &dyn LexicalIndex,
    embedder: &dyn Embedder,
    vector_index: &dyn VectorIndex,
    chunks: &[Chunk],
    batch_size: usize,
    progress: &mpsc::Sender<ProgressEvent>,
    cancellation: &CancellationToken,
) -> Result<(), DomainError> {
    for batch in chunks.chunks(batch_size.max(1)) {
        if cancellation.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        with_retry(|| lexical_index.add_chunks(batch)).await?;

        let texts: Vec<String> = batch
            .iter()
            .map(|c| format!("{} {}", c.entity_name().unwrap_or(""), c.content()))
            .collect();

        match embedder.embed(&texts).await {
            Ok(vectors) => {
                for (chunk, vector) in batch.iter().zip(vectors.into_iter()) {
                    with_retry(|| vector_index.upsert(chunk.chunk_id(), chunk_metadata(chunk), vector.clone()))
                        .await?;
                }
            }
            Err(e) => {
                warn!(
                    "embedding batch of {} chunks failed, falling back to lexical-only: {}",
                    batch.len(),
                    e
                );
            }
        }

        send(
            progress,
            Stage::Indexing,
            format!("indexed batch of {}", batch.len()),
            50,
        )
        .await;
    }
    Ok(())
}

pub(crate) fn chunk_metadata(chunk: &Chunk) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("language".to_string(), chunk.language().as_str().to_string());
    metadata.insert("entity_type".to_string(), chunk.entity_type().as_str().to_string());
    metadata.insert("source_file".to_string(), chunk.source_file().to_string());
    metadata.insert("repository".to_string(), chunk.repository().to_string());
    if let Some(name) = chunk.entity_name() {
        metadata.insert("entity_name".to_string(), name.to_string());
    }
    let (start, end) = chunk.line_range();
    metadata.insert("start_line".to_string(), start.to_string());
    metadata.insert("end_line".to_string(), end.to_string());
    metadata.insert("content".to_string(), chunk.content().to_string());
    if let Some(summary) = chunk.doc_summary() {
        metadata.insert("doc_summary".to_string(), summary.to_string());
    }
    metadata
}

fn enumerate_files(root: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .metadata()
                .map(|m| m.len() <= MAX_FILE_BYTES)
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Progress events are best-effort: a dropped receiver (caller no longer
/// listening) must never fail the pass.
pub(crate) async fn send(
    progress: &mpsc::Sender<ProgressEvent>,
    stage: Stage,
    message: impl Into<String>,
    percentage: u8,
) {
    let event = ProgressEvent::new(stage, message, percentage, now_iso8601());
    let _ = progress.send(event).await;
}

pub(crate) fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn timestamp_is_rfc3339() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_recovers_from_transient_index_write_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, DomainError> = with_retry(|| {
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(DomainError::index_write("transient write failure"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_escalates_non_retryable_errors_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, DomainError> = with_retry(|| {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::validation("not retryable"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn with_retry_escalates_after_exhausting_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, DomainError> = with_retry(|| {
            let attempts = &attempts;
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(DomainError::index_write("always fails"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_WRITE_ATTEMPTS);
    }
}

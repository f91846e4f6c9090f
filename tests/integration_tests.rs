//! End-to-end tests exercising the search/ingestion pipeline through real
//! adapters: tree-sitter parsing, a tantivy lexical index, a DuckDB vector
//! index, and the hybrid search orchestrator, with a mock embedder standing
//! in for ONNX so the tests don't need a downloaded model.

use std::path::Path;
use std::sync::Arc;

use megabrain::application::{
    CodeParser, Embedder, IndexRepositoryUseCase, LexicalIndex, ListRepositoriesUseCase,
    RepositoryRepository, RepositorySource, SearchCodeUseCase, VectorIndex,
};
use megabrain::connector::adapter::{
    DuckDbRepositoryRepository, DuckDbStateStore, DuckDbVectorIndex, GitRepositorySource,
    MockEmbedder, TantivyLexicalIndex, TreeSitterParser,
};
use megabrain::domain::{
    BoostConfiguration, EntityType, HybridWeights, Language, SearchMode, SearchQuery, Stage,
};

const SAMPLE_RUST: &str = include_str!("fixtures/sample_rust.rs");

fn init_sample_repo(dir: &Path) {
    let repo = git2::Repository::init(dir).unwrap();
    std::fs::write(dir.join("sample.rs"), SAMPLE_RUST).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new("sample.rs")).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let signature = git2::Signature::now("test", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
        .unwrap();
}

#[test]
fn parser_extracts_structs_functions_and_traits() {
    let parser = TreeSitterParser::new();
    assert!(parser.supports(Language::Rust));

    let chunks = parser
        .parse("demo-repo", "sample.rs", SAMPLE_RUST, Language::Rust)
        .expect("parsing a well-formed file should not fail");

    assert!(!chunks.is_empty());

    let names: Vec<&str> = chunks.iter().filter_map(|c| c.entity_name()).collect();
    assert!(names.contains(&"User"), "expected a chunk for the User struct, got {names:?}");
    assert!(names.contains(&"add"), "expected a chunk for the add function, got {names:?}");
    assert!(names.contains(&"Validate"), "expected a chunk for the Validate trait, got {names:?}");

    let struct_chunk = chunks
        .iter()
        .find(|c| c.entity_name() == Some("User"))
        .expect("User chunk present");
    assert_eq!(struct_chunk.entity_type(), EntityType::Struct);
    assert_eq!(struct_chunk.repository(), "demo-repo");
    assert_eq!(struct_chunk.source_file(), "sample.rs");

    // chunk_id is a deterministic function of repository/file/qualified name/byte range
    let chunks_again = parser.parse("demo-repo", "sample.rs", SAMPLE_RUST, Language::Rust).unwrap();
    assert_eq!(chunks[0].chunk_id(), chunks_again[0].chunk_id());
}

#[test]
fn parser_rejects_unsupported_language() {
    let parser = TreeSitterParser::new();
    assert!(!parser.supports(Language::Unknown));
}

#[tokio::test]
async fn hybrid_search_finds_indexed_chunks_by_keyword() {
    let parser = TreeSitterParser::new();
    let chunks = parser
        .parse("demo-repo", "sample.rs", SAMPLE_RUST, Language::Rust)
        .unwrap();

    let lexical_index = TantivyLexicalIndex::in_memory(BoostConfiguration::default()).unwrap();
    lexical_index.add_chunks(&chunks).await.unwrap();

    let embedder = MockEmbedder::new();
    let vector_index = DuckDbVectorIndex::in_memory(embedder.config().dimensions()).unwrap();

    let texts: Vec<String> = chunks.iter().map(|c| c.content().to_string()).collect();
    let vectors = embedder.embed(&texts).await.unwrap();
    for (chunk, vector) in chunks.iter().zip(vectors) {
        let mut metadata = std::collections::BTreeMap::new();
        metadata.insert("repository".to_string(), chunk.repository().to_string());
        metadata.insert("source_file".to_string(), chunk.source_file().to_string());
        vector_index.upsert(chunk.chunk_id(), metadata, vector).await.unwrap();
    }

    let use_case = SearchCodeUseCase::new(
        Arc::new(lexical_index),
        Arc::new(vector_index),
        Arc::new(embedder),
        BoostConfiguration::default(),
        HybridWeights::default(),
    )
    .unwrap();

    let query = SearchQuery::new("display_name").with_mode(SearchMode::Hybrid).with_limit(10);
    let response = use_case.execute(query).await.unwrap();

    assert!(response.total > 0, "expected at least one hit for display_name");
    assert!(response
        .results
        .iter()
        .any(|r| r.entity_name() == Some("display_name")));
}

#[tokio::test]
async fn keyword_only_search_skips_the_vector_backend() {
    let parser = TreeSitterParser::new();
    let chunks = parser
        .parse("demo-repo", "sample.rs", SAMPLE_RUST, Language::Rust)
        .unwrap();

    let lexical_index = TantivyLexicalIndex::in_memory(BoostConfiguration::default()).unwrap();
    lexical_index.add_chunks(&chunks).await.unwrap();

    let embedder = MockEmbedder::new();
    let vector_index = DuckDbVectorIndex::in_memory(embedder.config().dimensions()).unwrap();

    let use_case = SearchCodeUseCase::new(
        Arc::new(lexical_index),
        Arc::new(vector_index),
        Arc::new(embedder),
        BoostConfiguration::default(),
        HybridWeights::default(),
    )
    .unwrap();

    let query = SearchQuery::new("multiply").with_mode(SearchMode::Keyword);
    let response = use_case.execute(query).await.unwrap();

    assert!(response.results.iter().any(|r| r.entity_name() == Some("multiply")));
}

#[tokio::test]
async fn blank_query_is_rejected() {
    let lexical_index = TantivyLexicalIndex::in_memory(BoostConfiguration::default()).unwrap();
    let embedder = MockEmbedder::new();
    let vector_index = DuckDbVectorIndex::in_memory(embedder.config().dimensions()).unwrap();

    let use_case = SearchCodeUseCase::new(
        Arc::new(lexical_index),
        Arc::new(vector_index),
        Arc::new(embedder),
        BoostConfiguration::default(),
        HybridWeights::default(),
    )
    .unwrap();

    let err = use_case.execute(SearchQuery::new("   ")).await.unwrap_err();
    assert!(matches!(err, megabrain::domain::DomainError::ValidationError(_)));
}

#[tokio::test]
async fn list_repositories_is_empty_before_any_indexing() {
    let repository_repo: Arc<dyn RepositoryRepository> = Arc::new(DuckDbRepositoryRepository::in_memory().unwrap());
    let use_case = ListRepositoriesUseCase::new(repository_repo);

    let repositories = use_case.execute().await.unwrap();
    assert!(repositories.is_empty());
}

#[tokio::test]
async fn full_index_then_search_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    init_sample_repo(dir.path());

    let clone_root = tempfile::tempdir().unwrap();
    let repository_source: Arc<dyn RepositorySource> =
        Arc::new(GitRepositorySource::new(clone_root.path().to_path_buf()));
    let parsers: Vec<Arc<dyn CodeParser>> = vec![Arc::new(TreeSitterParser::new())];

    let embedder = MockEmbedder::new();
    let dimensions = embedder.config().dimensions();
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);

    let lexical_index: Arc<dyn LexicalIndex> =
        Arc::new(TantivyLexicalIndex::in_memory(BoostConfiguration::default()).unwrap());
    let vector_index: Arc<dyn VectorIndex> = Arc::new(DuckDbVectorIndex::in_memory(dimensions).unwrap());
    let state_store = Arc::new(DuckDbStateStore::in_memory().unwrap());
    let repository_repo: Arc<dyn RepositoryRepository> = Arc::new(DuckDbRepositoryRepository::in_memory().unwrap());

    let index_use_case = IndexRepositoryUseCase::new(
        repository_source,
        parsers,
        Arc::clone(&lexical_index),
        Arc::clone(&vector_index),
        Arc::clone(&embedder),
        state_store,
        Arc::clone(&repository_repo),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let cancellation = tokio_util::sync::CancellationToken::new();
    let path = dir.path().to_str().unwrap().to_string();

    let handle = tokio::spawn(async move {
        index_use_case
            .execute(&path, Some("sample-repo"), cancellation, tx)
            .await
    });

    let mut saw_complete = false;
    while let Some(event) = rx.recv().await {
        if event.stage == Stage::Complete {
            saw_complete = true;
        }
    }
    let repository = handle.await.unwrap().unwrap();

    assert!(saw_complete, "expected a Complete progress event");
    assert_eq!(repository.name(), "sample-repo");
    assert!(repository.chunk_count() > 0);
    assert!(repository.file_count() >= 1);

    let search_use_case = SearchCodeUseCase::new(
        lexical_index,
        vector_index,
        embedder,
        BoostConfiguration::default(),
        HybridWeights::default(),
    )
    .unwrap();

    let response = search_use_case
        .execute(SearchQuery::new("User").with_mode(SearchMode::Hybrid))
        .await
        .unwrap();

    assert!(response.total > 0);
}

#[test]
fn language_detection_matches_extension() {
    assert_eq!(Language::from_extension("rs"), Language::Rust);
    assert_eq!(Language::from_extension("py"), Language::Python);
    assert_eq!(Language::from_extension("js"), Language::JavaScript);
    assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
    assert_eq!(Language::from_extension("go"), Language::Go);
    assert_eq!(Language::from_extension("md"), Language::Unknown);
}

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::{
    CodeParser, DeleteRepositoryUseCase, Embedder, IncrementalIndexUseCase, IndexRepositoryUseCase,
    LexicalIndex, ListRepositoriesUseCase, RepositoryIndexStateStore, RepositoryRepository,
    RepositorySource, SearchCodeUseCase, VectorIndex,
};
use crate::config::MegabrainConfig;
use crate::connector::adapter::{
    DuckDbRepositoryRepository, DuckDbStateStore, DuckDbVectorIndex, GitRepositorySource,
    MockEmbedder, OrtEmbedder, TantivyLexicalIndex, TreeSitterParser,
};
use crate::domain::DomainError;

/// Wires every adapter behind its interface and hands out ready-to-use case
/// objects: one struct built once at startup, holding `Arc<dyn Trait>`
/// collaborators plus the concrete types that need direct access (e.g. to
/// share a DuckDB connection).
pub struct Container {
    config: MegabrainConfig,
    repository_source: Arc<dyn RepositorySource>,
    parsers: Vec<Arc<dyn CodeParser>>,
    lexical_index: Arc<dyn LexicalIndex>,
    vector_index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    state_store: Arc<dyn RepositoryIndexStateStore>,
    repository_repo: Arc<dyn RepositoryRepository>,
    full_index_use_case: Arc<IndexRepositoryUseCase>,
}

impl Container {
    pub async fn new(config: MegabrainConfig) -> Result<Self, DomainError> {
        std::fs::create_dir_all(config.lexical_index_dir()).map_err(DomainError::Io)?;
        std::fs::create_dir_all(config.clone_root()).map_err(DomainError::Io)?;

        let boost = config.search.boost.clone().into_domain();
        boost.validate()?;

        debug!("opening lexical index at {:?}", config.lexical_index_dir());
        let lexical_index: Arc<dyn LexicalIndex> =
            Arc::new(TantivyLexicalIndex::open_or_create(&config.lexical_index_dir(), boost)?);

        debug!("opening DuckDB-backed stores at {:?}", config.vector_db_path());
        let vector_index_adapter = DuckDbVectorIndex::open(&config.vector_db_path(), config.embedding_dimensions)?;
        let shared_conn = vector_index_adapter.shared_connection();
        let vector_index: Arc<dyn VectorIndex> = Arc::new(vector_index_adapter);

        let repository_repo: Arc<dyn RepositoryRepository> =
            Arc::new(DuckDbRepositoryRepository::with_connection(Arc::clone(&shared_conn))?);
        let state_store: Arc<dyn RepositoryIndexStateStore> =
            Arc::new(DuckDbStateStore::with_connection(shared_conn)?);

        let embedder: Arc<dyn Embedder> = if config.mock_embeddings {
            debug!("using mock embedder ({} dimensions)", config.embedding_dimensions);
            Arc::new(MockEmbedder::with_dimensions(config.embedding_dimensions))
        } else {
            info!("loading ONNX embedding model");
            match OrtEmbedder::new(None) {
                Ok(embedder) => Arc::new(embedder),
                Err(e) => {
                    warn!("failed to load ONNX embedder ({e}), falling back to mock embeddings");
                    Arc::new(MockEmbedder::with_dimensions(config.embedding_dimensions))
                }
            }
        };

        let repository_source: Arc<dyn RepositorySource> = Arc::new(GitRepositorySource::new(config.clone_root()));

        let parsers: Vec<Arc<dyn CodeParser>> = vec![Arc::new(TreeSitterParser::new())];

        let full_index_use_case = Arc::new(
            IndexRepositoryUseCase::new(
                repository_source.clone(),
                parsers.clone(),
                lexical_index.clone(),
                vector_index.clone(),
                embedder.clone(),
                state_store.clone(),
                repository_repo.clone(),
            )
            .with_batch_size(config.index.batch.size),
        );

        Ok(Self {
            config,
            repository_source,
            parsers,
            lexical_index,
            vector_index,
            embedder,
            state_store,
            repository_repo,
            full_index_use_case,
        })
    }

    pub fn index_use_case(&self) -> Arc<IndexRepositoryUseCase> {
        self.full_index_use_case.clone()
    }

    pub fn incremental_index_use_case(&self) -> IncrementalIndexUseCase {
        IncrementalIndexUseCase::new(
            self.repository_source.clone(),
            self.parsers.clone(),
            self.lexical_index.clone(),
            self.vector_index.clone(),
            self.embedder.clone(),
            self.state_store.clone(),
            self.repository_repo.clone(),
            self.full_index_use_case.clone(),
        )
    }

    pub fn search_use_case(&self) -> Result<SearchCodeUseCase, DomainError> {
        let boost = self.config.search.boost.clone().into_domain();
        let weights = self.config.search.hybrid.clone().into_domain()?;
        let facets = self.config.search.facets.clone().into_domain();
        let transitive = self.config.search.transitive.clone().into_domain()?;
        SearchCodeUseCase::with_config(
            self.lexical_index.clone(),
            self.vector_index.clone(),
            self.embedder.clone(),
            boost,
            weights,
            facets,
            transitive,
        )
    }

    pub fn list_use_case(&self) -> ListRepositoriesUseCase {
        ListRepositoriesUseCase::new(self.repository_repo.clone())
    }

    pub fn delete_use_case(&self) -> DeleteRepositoryUseCase {
        DeleteRepositoryUseCase::new(
            self.repository_repo.clone(),
            self.lexical_index.clone(),
            self.vector_index.clone(),
            self.state_store.clone(),
        )
    }

    pub fn config(&self) -> &MegabrainConfig {
        &self.config
    }
}

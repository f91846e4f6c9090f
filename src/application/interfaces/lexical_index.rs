use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, FacetCounts, SearchFilters};

/// A single lexical hit: the stored chunk plus its raw (pre-normalization)
/// relevance score and, when requested, a per-field breakdown.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub chunk: Chunk,
    pub score: f32,
    pub matched_fields: Vec<String>,
    pub field_scores: std::collections::BTreeMap<String, f32>,
}

/// The full-text inverted index over `Chunk`s.
///
/// Single writer, many readers: implementations are expected to serialize
/// `add_chunks`/`remove_by_file`/`remove_by_id` against each other while
/// allowing concurrent `search`/`compute_facets` calls against the last
/// committed snapshot.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), DomainError>;

    async fn remove_by_file(&self, repository: &str, source_file: &str) -> Result<(), DomainError>;

    async fn remove_by_id(&self, chunk_id: &str) -> Result<(), DomainError>;

    /// Removes every chunk belonging to `repository`, used by the delete
    /// repository use case.
    async fn remove_by_repository(&self, repository: &str) -> Result<(), DomainError>;

    /// Parses `query` with the code-aware analyzer and returns up to `limit`
    /// hits after `offset`, honoring `filters`. Never returns a parse error
    /// to the caller: malformed queries degrade per the documented chain
    /// (escape-and-retry, then literal bag-of-words, then an empty result).
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        offset: usize,
        include_field_match: bool,
    ) -> Result<Vec<LexicalHit>, DomainError>;

    /// Facet counts over {language, repository, entity_type} for the
    /// document set matching `query ∧ filters`, top `limit` values per
    /// field. An empty `query` facets over `filters` alone.
    async fn compute_facets(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<FacetCounts, DomainError>;

    /// Exact lookup by `entity_qualified_name`, used by the transitive graph
    /// resolver to follow an `extends`/`implements` edge to its target.
    async fn find_by_qualified_name(
        &self,
        repository: &str,
        qualified_name: &str,
    ) -> Result<Option<Chunk>, DomainError>;
}

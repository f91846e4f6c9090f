use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Stored alongside a vector so the merge stage can build a `SearchResult`
/// without a second round-trip to the lexical index.
pub type VectorMetadata = BTreeMap<String, String>;

/// A single vector hit: `similarity = 1 - cosine_distance`, in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub metadata: VectorMetadata,
    pub similarity: f32,
}

/// The dense-vector ANN index over `Chunk` embeddings.
///
/// Dimension is fixed at construction; a mismatched vector is an
/// `IncompatibleVectorError`, never a silent truncation.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn upsert(
        &self,
        chunk_id: &str,
        metadata: VectorMetadata,
        vector: Vec<f32>,
    ) -> Result<(), DomainError>;

    async fn delete(&self, chunk_id: &str) -> Result<(), DomainError>;

    async fn delete_by_file(&self, repository: &str, source_file: &str) -> Result<(), DomainError>;

    /// Removes every vector belonging to `repository`, used by the delete
    /// repository use case.
    async fn delete_by_repository(&self, repository: &str) -> Result<(), DomainError>;

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<VectorHit>, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}

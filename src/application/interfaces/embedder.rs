use async_trait::async_trait;

use crate::domain::{DomainError, EmbeddingConfig};

/// Batched text-to-vector inference. Implementations must be idempotent: the
/// same text always yields the same vector (up to floating-point rounding).
///
/// A batch failure must never block lexical indexing — callers fall the
/// affected chunks back to lexical-only rather than aborting the pass.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    fn config(&self) -> &EmbeddingConfig;
}

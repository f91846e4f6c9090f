use thiserror::Error;

/// Error taxonomy surfaced to callers of the engine.
///
/// Variants map onto the response codes/semantics of the Search and
/// Ingestion APIs: `ValidationError`/`NotFound` carry HTTP status,
/// `IndexWriteError`/`EmbedderError`/`ParseError` are recovered at
/// progressively coarser granularity (batch/chunk/file), and
/// `RepositoryAccessError` aborts the current ingestion pass outright.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("index write error: {0}")]
    IndexWriteError(String),

    #[error("embedder error: {0}")]
    EmbedderError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("repository access error: {0}")]
    RepositoryAccessError(String),

    #[error("incompatible vector dimension: expected {expected}, got {actual}")]
    IncompatibleVectorError { expected: usize, actual: usize },

    #[error("query exceeded its deadline")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn index_write(msg: impl Into<String>) -> Self {
        Self::IndexWriteError(msg.into())
    }

    pub fn embedder(msg: impl Into<String>) -> Self {
        Self::EmbedderError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn repository_access(msg: impl Into<String>) -> Self {
        Self::RepositoryAccessError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IndexWriteError(_))
    }

    /// HTTP status for the thin external-interface shell.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_) => 400,
            Self::NotFound(_) => 404,
            Self::Timeout => 504,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(DomainError::validation("q").status_code(), 400);
        assert_eq!(DomainError::not_found("repo").status_code(), 404);
        assert_eq!(DomainError::Timeout.status_code(), 504);
        assert_eq!(DomainError::internal("boom").status_code(), 500);
    }
}

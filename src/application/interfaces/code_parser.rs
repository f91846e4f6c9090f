use crate::domain::{Chunk, DomainError, Language};

/// Converts one source file's bytes into the `Chunk`s it defines.
///
/// A parse failure is always per-file: the caller logs and skips it, it
/// never aborts the enclosing pass.
pub trait CodeParser: Send + Sync {
    fn supports(&self, language: Language) -> bool;

    fn parse(
        &self,
        repository: &str,
        source_file: &str,
        content: &str,
        language: Language,
    ) -> Result<Vec<Chunk>, DomainError>;
}

mod duckdb_repository_repository;
mod duckdb_state_store;
mod duckdb_vector_index;
mod git_repository_source;
mod mock_embedder;
mod ort_embedder;
mod tantivy_lexical_index;
mod treesitter_parser;

pub use duckdb_repository_repository::*;
pub use duckdb_state_store::*;
pub use duckdb_vector_index::*;
pub use git_repository_source::*;
pub use mock_embedder::*;
pub use ort_embedder::*;
pub use tantivy_lexical_index::*;
pub use treesitter_parser::*;

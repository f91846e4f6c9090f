mod code_parser;
mod embedder;
mod lexical_index;
mod repository_repository;
mod repository_source;
mod state_store;
mod vector_index;

pub use code_parser::*;
pub use embedder::*;
pub use lexical_index::*;
pub use repository_repository::*;
pub use repository_source::*;
pub use state_store::*;
pub use vector_index::*;

//! # Connector Layer
//!
//! External integrations implementing the application layer's interfaces:
//! - Parsing (tree-sitter)
//! - Lexical indexing (tantivy)
//! - Vector storage and repository/state persistence (DuckDB)
//! - Embedding generation (ONNX Runtime, or a deterministic mock)
//! - Source control access (git2)
//!
//! `api` wires these adapters into the use cases and exposes them through
//! the CLI and the thin HTTP surface.

pub mod adapter;
pub mod api;

pub use adapter::*;

//! # MegaBrain
//!
//! A hybrid lexical + semantic code search and indexing engine: a parsing
//! pipeline turns repositories into `Chunk`s, a lexical (tantivy) and a
//! vector (DuckDB) index hold complementary views of them, and the Hybrid
//! Search Orchestrator merges queries across both.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models, errors, and value types.
//! - `application`: Collaborator interfaces and use cases orchestrating them.
//! - `connector`: External integrations (tantivy, DuckDB, tree-sitter, git2,
//!   ONNX Runtime) implementing those interfaces, plus the CLI/API shell
//!   that wires them together.
//! - `config`: Startup configuration surface (`~/.megabrain/config.toml`).
//! - `cli`: Command definitions for the thin CLI shell.

pub mod application;
pub mod cli;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;

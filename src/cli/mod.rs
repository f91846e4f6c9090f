//! CLI surface: a thin shell over the search/ingestion use cases. Command
//! shapes mirror what a remote Search/Ingestion API would expose, without
//! owning any of their logic.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full or incremental ingestion pass over a repository.
    Index {
        /// Local path or remote URL of the repository to index.
        path: String,

        /// Optional display name; defaults to the last path component.
        #[arg(short, long)]
        name: Option<String>,

        /// Diff against the last indexed commit instead of a full re-index.
        #[arg(short, long)]
        incremental: bool,
    },

    /// Run a hybrid/keyword/vector search against the indexed corpus.
    Search {
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// hybrid (default), keyword, or vector.
        #[arg(short, long, default_value = "hybrid")]
        mode: String,

        #[arg(short = 'L', long = "language")]
        languages: Vec<String>,

        #[arg(short, long = "repository")]
        repositories: Vec<String>,

        #[arg(long)]
        file_path: Option<String>,

        #[arg(short = 'E', long = "entity-type")]
        entity_types: Vec<String>,

        #[arg(long)]
        include_field_match: bool,

        /// Expand results by structural (extends/implements) closure.
        #[arg(long)]
        transitive: bool,

        #[arg(long)]
        depth: Option<u32>,
    },

    /// List indexed repositories.
    List,

    /// Delete a repository and its indexed data, by id or by path.
    Delete { id_or_path: String },

    /// Aggregate statistics across all indexed repositories.
    Stats,
}

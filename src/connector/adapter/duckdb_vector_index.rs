use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{VectorHit, VectorIndex, VectorMetadata};
use crate::domain::DomainError;

/// Dense-vector ANN index backed by DuckDB's `vss` extension (HNSW over a
/// fixed-width `FLOAT[n]` column). Dimension is chosen at construction time
/// and baked into the table DDL, since DuckDB's array type requires a
/// compile-time-like literal width.
pub struct DuckDbVectorIndex {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
}

impl DuckDbVectorIndex {
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::index_write(format!("failed to open vector store: {e}")))?;
        Self::initialize(&conn, dimensions)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    pub fn in_memory(dimensions: usize) -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::index_write(format!("failed to open in-memory vector store: {e}")))?;
        Self::initialize(&conn, dimensions)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    /// Shares a single connection across adapters backed by the same DuckDB
    /// file — DuckDB allows only one write handle per database file.
    pub fn with_connection(conn: Arc<Mutex<Connection>>, dimensions: usize) -> Result<Self, DomainError> {
        Ok(Self { conn, dimensions })
    }

    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize(conn: &Connection, dimensions: usize) -> Result<(), DomainError> {
        conn.execute_batch("INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;")
            .map_err(|e| DomainError::index_write(format!("failed to load vss extension: {e}")))?;

        let schema_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                chunk_id TEXT PRIMARY KEY,
                repository TEXT NOT NULL,
                source_file TEXT NOT NULL,
                vector FLOAT[{dim}] NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS vectors_hnsw_idx ON vectors USING HNSW (vector) WITH (metric = 'cosine');
            "#,
            dim = dimensions
        );
        conn.execute_batch(&schema_sql)
            .map_err(|e| DomainError::index_write(format!("failed to initialize vector schema: {e}")))?;
        Ok(())
    }

    fn vector_literal(&self, vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::IncompatibleVectorError {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        let mut literal = String::with_capacity(vector.len() * 8 + 16);
        literal.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                literal.push_str(", ");
            }
            literal.push_str(&v.to_string());
        }
        literal.push(']');
        literal.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(literal)
    }

    fn row_to_hit(row: &Row) -> Result<VectorHit, duckdb::Error> {
        let chunk_id: String = row.get(0)?;
        let metadata_json: String = row.get(1)?;
        let similarity: f32 = row.get(2)?;
        let metadata: VectorMetadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        Ok(VectorHit {
            chunk_id,
            metadata,
            similarity,
        })
    }
}

#[async_trait]
impl VectorIndex for DuckDbVectorIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn upsert(&self, chunk_id: &str, metadata: VectorMetadata, vector: Vec<f32>) -> Result<(), DomainError> {
        let array_lit = self.vector_literal(&vector)?;
        let repository = metadata.get("repository").cloned().unwrap_or_default();
        let source_file = metadata.get("source_file").cloned().unwrap_or_default();
        let metadata_json = serde_json::to_string(&metadata).unwrap_or_default();

        let conn = self.conn.lock().await;
        let sql = format!(
            "INSERT OR REPLACE INTO vectors (chunk_id, repository, source_file, vector, metadata) \
             VALUES (?, ?, ?, {array_lit}, ?)"
        );
        conn.execute(&sql, params![chunk_id, repository, source_file, metadata_json])
            .map_err(|e| DomainError::index_write(format!("failed to upsert vector for {chunk_id}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, chunk_id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM vectors WHERE chunk_id = ?", params![chunk_id])
            .map_err(|e| DomainError::index_write(format!("failed to delete vector {chunk_id}: {e}")))?;
        Ok(())
    }

    async fn delete_by_file(&self, repository: &str, source_file: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM vectors WHERE repository = ? AND source_file = ?",
            params![repository, source_file],
        )
        .map_err(|e| DomainError::index_write(format!("failed to delete vectors for {source_file}: {e}")))?;
        Ok(())
    }

    async fn delete_by_repository(&self, repository: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM vectors WHERE repository = ?", params![repository])
            .map_err(|e| DomainError::index_write(format!("failed to delete vectors for {repository}: {e}")))?;
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<VectorHit>, DomainError> {
        let array_lit = self.vector_literal(query_vector)?;
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT chunk_id, metadata, 1.0 - array_cosine_distance(vector, {array_lit}) AS similarity \
             FROM vectors \
             ORDER BY array_cosine_distance(vector, {array_lit}) \
             LIMIT ?"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::index_write(format!("failed to prepare vector search: {e}")))?;
        let mut rows = stmt
            .query(params![limit as i64])
            .map_err(|e| DomainError::index_write(format!("failed to run vector search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::index_write(format!("failed to read vector search row: {e}")))?
        {
            hits.push(Self::row_to_hit(row).map_err(|e| DomainError::index_write(format!("failed to parse hit: {e}")))?);
        }
        debug!("vector search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))
            .map_err(|e| DomainError::index_write(format!("failed to count vectors: {e}")))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vector(dim: usize, hot_index: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot_index] = 1.0;
        v
    }

    #[tokio::test]
    async fn upsert_then_search_returns_closest_vector() {
        let index = DuckDbVectorIndex::in_memory(8).unwrap();
        let mut metadata_a: BTreeMap<String, String> = BTreeMap::new();
        metadata_a.insert("repository".to_string(), "repo".to_string());
        metadata_a.insert("source_file".to_string(), "a.rs".to_string());
        index.upsert("a", metadata_a, unit_vector(8, 0)).await.unwrap();

        let mut metadata_b: BTreeMap<String, String> = BTreeMap::new();
        metadata_b.insert("repository".to_string(), "repo".to_string());
        metadata_b.insert("source_file".to_string(), "b.rs".to_string());
        index.upsert("b", metadata_b, unit_vector(8, 1)).await.unwrap();

        let hits = index.search(&unit_vector(8, 0), 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a");
        assert!(hits[0].similarity > 0.9);
    }

    #[tokio::test]
    async fn mismatched_dimension_is_rejected() {
        let index = DuckDbVectorIndex::in_memory(8).unwrap();
        let err = index.upsert("a", BTreeMap::new(), vec![0.0; 4]).await.unwrap_err();
        assert!(matches!(err, DomainError::IncompatibleVectorError { expected: 8, actual: 4 }));
    }

    #[tokio::test]
    async fn delete_by_file_removes_only_that_files_vectors() {
        let index = DuckDbVectorIndex::in_memory(4).unwrap();
        let mut metadata: BTreeMap<String, String> = BTreeMap::new();
        metadata.insert("repository".to_string(), "repo".to_string());
        metadata.insert("source_file".to_string(), "a.rs".to_string());
        index.upsert("a", metadata, unit_vector(4, 0)).await.unwrap();
        index.delete_by_file("repo", "a.rs").await.unwrap();

        assert_eq!(index.count().await.unwrap(), 0);
    }
}

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::RepositoryIndexStateStore;
use crate::domain::{DomainError, RepositoryIndexState};

/// Commit watermark store: one row per `repository_url`, tracking the last
/// commit an incremental indexing pass resolved cleanly to. Kept separate
/// from [`crate::connector::adapter::DuckDbRepositoryRepository`] since the
/// watermark is indexing-pipeline state, not display metadata.
pub struct DuckDbStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStateStore {
    pub fn open(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::index_write(format!("failed to open state store: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::index_write(format!("failed to open in-memory state store: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        Self::initialize_schema(&conn.try_lock().map_err(|e| {
            DomainError::index_write(format!("shared connection is in use: {e}"))
        })?)?;
        Ok(Self { conn })
    }

    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS index_state (
                repository_url TEXT PRIMARY KEY,
                last_indexed_commit TEXT NOT NULL,
                last_indexed_at BIGINT NOT NULL
            );
            "#,
        )
        .map_err(|e| DomainError::index_write(format!("failed to initialize state schema: {e}")))?;

        debug!("index state schema initialized");
        Ok(())
    }
}

#[async_trait]
impl RepositoryIndexStateStore for DuckDbStateStore {
    async fn get(&self, repository_url: &str) -> Result<Option<RepositoryIndexState>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT repository_url, last_indexed_commit, last_indexed_at FROM index_state WHERE repository_url = ?1",
            )
            .map_err(|e| DomainError::index_write(format!("failed to prepare lookup: {e}")))?;

        match stmt.query_row(params![repository_url], |row| {
            Ok(RepositoryIndexState::reconstitute(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
            ))
        }) {
            Ok(state) => Ok(Some(state)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::index_write(format!("failed to query index state: {e}"))),
        }
    }

    async fn put(&self, state: RepositoryIndexState) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO index_state (repository_url, last_indexed_commit, last_indexed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (repository_url) DO UPDATE SET
                last_indexed_commit = excluded.last_indexed_commit,
                last_indexed_at = excluded.last_indexed_at
            "#,
            params![
                state.repository_url(),
                state.last_indexed_commit(),
                state.last_indexed_at(),
            ],
        )
        .map_err(|e| DomainError::index_write(format!("failed to persist index state: {e}")))?;
        Ok(())
    }

    async fn exists(&self, repository_url: &str) -> Result<bool, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM index_state WHERE repository_url = ?1",
                params![repository_url],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::index_write(format!("failed to check index state: {e}")))?;
        Ok(count > 0)
    }

    async fn delete(&self, repository_url: &str) -> Result<bool, DomainError> {
        let conn = self.conn.lock().await;
        let affected = conn
            .execute(
                "DELETE FROM index_state WHERE repository_url = ?1",
                params![repository_url],
            )
            .map_err(|e| DomainError::index_write(format!("failed to delete index state: {e}")))?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = DuckDbStateStore::in_memory().unwrap();
        let state = RepositoryIndexState::new(
            "https://example.com/repo.git".to_string(),
            "a1b2c3d4".to_string(),
        );
        store.put(state).await.unwrap();

        let found = store.get("https://example.com/repo.git").await.unwrap().unwrap();
        assert_eq!(found.last_indexed_commit(), "a1b2c3d4");
    }

    #[tokio::test]
    async fn put_is_an_upsert() {
        let store = DuckDbStateStore::in_memory().unwrap();
        let url = "https://example.com/repo.git".to_string();
        store.put(RepositoryIndexState::new(url.clone(), "sha1".to_string())).await.unwrap();
        store.put(RepositoryIndexState::new(url.clone(), "sha2".to_string())).await.unwrap();

        let found = store.get(&url).await.unwrap().unwrap();
        assert_eq!(found.last_indexed_commit(), "sha2");
    }

    #[tokio::test]
    async fn exists_reflects_presence() {
        let store = DuckDbStateStore::in_memory().unwrap();
        let url = "https://example.com/repo.git".to_string();
        assert!(!store.exists(&url).await.unwrap());

        store.put(RepositoryIndexState::new(url.clone(), "sha1".to_string())).await.unwrap();
        assert!(store.exists(&url).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let store = DuckDbStateStore::in_memory().unwrap();
        let url = "https://example.com/repo.git".to_string();
        assert!(!store.delete(&url).await.unwrap());

        store.put(RepositoryIndexState::new(url.clone(), "sha1".to_string())).await.unwrap();
        assert!(store.delete(&url).await.unwrap());
    }
}

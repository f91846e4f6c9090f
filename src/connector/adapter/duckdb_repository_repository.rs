use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::RepositoryRepository;
use crate::domain::{DomainError, Repository, VectorStore};

/// Catalog of indexed repositories, independent of the commit watermark
/// tracked by [`crate::connector::adapter::DuckDbStateStore`].
pub struct DuckDbRepositoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbRepositoryRepository {
    pub fn open(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::index_write(format!("failed to open repository catalog: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::index_write(format!("failed to open in-memory repository catalog: {e}")))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shares a single connection across adapters backed by the same DuckDB
    /// file — DuckDB allows only one write handle per database file.
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
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                chunk_count BIGINT DEFAULT 0,
                file_count BIGINT DEFAULT 0,
                store TEXT DEFAULT 'duckdb',
                namespace TEXT
            );
            "#,
        )
        .map_err(|e| DomainError::index_write(format!("failed to initialize repository schema: {e}")))?;

        debug!("repository catalog schema initialized");
        Ok(())
    }

    fn row_to_repository(row: &duckdb::Row) -> Result<Repository, duckdb::Error> {
        let store_str: String = row
            .get::<_, Option<String>>(7)?
            .unwrap_or_else(|| "duckdb".to_string());
        let namespace: Option<String> = row.get(8)?;
        Ok(Repository::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get::<_, i64>(5)? as u64,
            row.get::<_, i64>(6)? as u64,
            VectorStore::from_str(&store_str),
            namespace,
        ))
    }
}

const SELECT_COLUMNS: &str =
    "id, name, path, created_at, updated_at, chunk_count, file_count, store, namespace";

#[async_trait]
impl RepositoryRepository for DuckDbRepositoryRepository {
    async fn save(&self, repository: &Repository) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                r#"
                INSERT INTO repositories ({SELECT_COLUMNS})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    path = excluded.path,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    chunk_count = excluded.chunk_count,
                    file_count = excluded.file_count,
                    store = excluded.store,
                    namespace = excluded.namespace
                "#
            ),
            params![
                repository.id(),
                repository.name(),
                repository.path(),
                repository.created_at(),
                repository.updated_at(),
                repository.chunk_count() as i64,
                repository.file_count() as i64,
                repository.store().as_str(),
                repository.namespace(),
            ],
        )
        .map_err(|e| DomainError::index_write(format!("failed to save repository: {e}")))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM repositories WHERE id = ?1"))
            .map_err(|e| DomainError::index_write(format!("failed to prepare lookup: {e}")))?;

        match stmt.query_row(params![id], Self::row_to_repository) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::index_write(format!("failed to query repository: {e}"))),
        }
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM repositories WHERE path = ?1"))
            .map_err(|e| DomainError::index_write(format!("failed to prepare lookup: {e}")))?;

        match stmt.query_row(params![path], Self::row_to_repository) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::index_write(format!(
                "failed to query repository by path: {e}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM repositories ORDER BY name"))
            .map_err(|e| DomainError::index_write(format!("failed to prepare listing: {e}")))?;

        let rows = stmt
            .query_map([], Self::row_to_repository)
            .map_err(|e| DomainError::index_write(format!("failed to list repositories: {e}")))?;

        let mut repos = Vec::new();
        for row in rows {
            repos.push(row.map_err(|e| DomainError::index_write(format!("failed to read row: {e}")))?);
        }
        Ok(repos)
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM repositories WHERE id = ?1", params![id])
            .map_err(|e| DomainError::index_write(format!("failed to delete repository: {e}")))?;
        Ok(())
    }

    async fn update_stats(&self, id: &str, chunk_count: u64, file_count: u64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        conn.execute(
            "UPDATE repositories SET chunk_count = ?1, file_count = ?2, updated_at = ?3 WHERE id = ?4",
            params![chunk_count as i64, file_count as i64, now, id],
        )
        .map_err(|e| DomainError::index_write(format!("failed to update repository stats: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_find_round_trips() {
        let repo = DuckDbRepositoryRepository::in_memory().unwrap();
        let model = Repository::new("megabrain".to_string(), "/repos/megabrain".to_string());
        repo.save(&model).await.unwrap();

        let found = repo.find_by_id(model.id()).await.unwrap().unwrap();
        assert_eq!(found.name(), "megabrain");
        assert_eq!(found.path(), "/repos/megabrain");
    }

    #[tokio::test]
    async fn find_by_path_locates_existing_repository() {
        let repo = DuckDbRepositoryRepository::in_memory().unwrap();
        let model = Repository::new("megabrain".to_string(), "/repos/megabrain".to_string());
        repo.save(&model).await.unwrap();

        let found = repo.find_by_path("/repos/megabrain").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn missing_repository_returns_none() {
        let repo = DuckDbRepositoryRepository::in_memory().unwrap();
        assert!(repo.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_stats_bumps_counts() {
        let repo = DuckDbRepositoryRepository::in_memory().unwrap();
        let model = Repository::new("megabrain".to_string(), "/repos/megabrain".to_string());
        repo.save(&model).await.unwrap();

        repo.update_stats(model.id(), 42, 7).await.unwrap();
        let found = repo.find_by_id(model.id()).await.unwrap().unwrap();
        assert_eq!(found.chunk_count(), 42);
        assert_eq!(found.file_count(), 7);
    }

    #[tokio::test]
    async fn delete_removes_repository() {
        let repo = DuckDbRepositoryRepository::in_memory().unwrap();
        let model = Repository::new("megabrain".to_string(), "/repos/megabrain".to_string());
        repo.save(&model).await.unwrap();
        repo.delete(model.id()).await.unwrap();

        assert!(repo.find_by_id(model.id()).await.unwrap().is_none());
    }
}

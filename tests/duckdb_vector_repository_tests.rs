use std::collections::BTreeMap;

use megabrain::{DuckDbVectorIndex, VectorIndex};
use tempfile::tempdir;

fn unit_vector(dim: usize, hot_index: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot_index] = 1.0;
    v
}

fn metadata(repository: &str, source_file: &str) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("repository".to_string(), repository.to_string());
    m.insert("source_file".to_string(), source_file.to_string());
    m
}

#[tokio::test]
async fn duckdb_vector_index_upsert_then_search_returns_closest_vector() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("vectors.duckdb");

    let index = DuckDbVectorIndex::open(&db_path, 384).expect("duckdb init");
    let vector = unit_vector(384, 0);
    index
        .upsert("chunk-1", metadata("repo-1", "src/lib.rs"), vector.clone())
        .await
        .expect("upsert");

    let hits = index.search(&vector, 3).await.expect("search");
    assert!(!hits.is_empty(), "expected at least one result");
    assert_eq!(hits[0].chunk_id, "chunk-1");
    assert!(hits[0].similarity > 0.99, "expected near-identical similarity");
}

#[tokio::test]
async fn duckdb_vector_index_mismatched_dimension_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("vectors.duckdb");

    let index = DuckDbVectorIndex::open(&db_path, 384).expect("duckdb init");
    let wrong_dim = vec![0.0_f32; 16];

    let result = index.upsert("chunk-1", metadata("repo-1", "src/lib.rs"), wrong_dim).await;
    assert!(result.is_err(), "expected a dimension mismatch error");
}

#[tokio::test]
async fn duckdb_vector_index_delete_by_repository_removes_all() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("vectors.duckdb");

    let index = DuckDbVectorIndex::open(&db_path, 384).expect("duckdb init");
    index
        .upsert("chunk-a", metadata("repo-del", "src/a.rs"), unit_vector(384, 1))
        .await
        .expect("upsert a");
    index
        .upsert("chunk-b", metadata("repo-del", "src/b.rs"), unit_vector(384, 2))
        .await
        .expect("upsert b");

    assert_eq!(index.count().await.expect("count"), 2);

    index.delete_by_repository("repo-del").await.expect("delete_by_repository");
    assert_eq!(index.count().await.expect("count"), 0);
}

#[tokio::test]
async fn duckdb_vector_index_delete_by_file_isolates_other_files() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("vectors.duckdb");

    let index = DuckDbVectorIndex::open(&db_path, 384).expect("duckdb init");
    index
        .upsert("chunk-a", metadata("repo", "src/a.rs"), unit_vector(384, 1))
        .await
        .expect("upsert a");
    index
        .upsert("chunk-b", metadata("repo", "src/b.rs"), unit_vector(384, 2))
        .await
        .expect("upsert b");

    index.delete_by_file("repo", "src/a.rs").await.expect("delete_by_file");

    let remaining = index.search(&unit_vector(384, 2), 10).await.expect("search");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].chunk_id, "chunk-b");
}

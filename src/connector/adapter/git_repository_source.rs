use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{build::RepoBuilder, Delta, DiffFindOptions, Oid, Repository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::{RepositorySource, WorkingTree};
use crate::domain::{DomainError, FileChange};

/// Git-backed source: clones remote URLs into a scratch directory, opens
/// local paths in place, and diffs two commits with rename detection for
/// the incremental indexer.
pub struct GitRepositorySource {
    clone_root: PathBuf,
}

impl GitRepositorySource {
    pub fn new(clone_root: PathBuf) -> Self {
        Self { clone_root }
    }

    fn is_local_path(url: &str) -> bool {
        !url.contains("://") && !url.starts_with("git@")
    }

    fn open_blocking(local_path: String) -> Result<Repository, DomainError> {
        Repository::discover(&local_path)
            .map_err(|e| DomainError::repository_access(format!("not a git repository at {local_path}: {e}")))
    }
}

#[async_trait]
impl RepositorySource for GitRepositorySource {
    async fn clone_or_open(&self, url: &str) -> Result<WorkingTree, DomainError> {
        let url = url.to_string();
        let clone_root = self.clone_root.clone();

        tokio::task::spawn_blocking(move || -> Result<WorkingTree, DomainError> {
            let (repo, local_path) = if GitRepositorySource::is_local_path(&url) {
                let repo = Repository::discover(&url)
                    .map_err(|e| DomainError::repository_access(format!("not a git repository at {url}: {e}")))?;
                let path = repo
                    .workdir()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|| url.clone());
                (repo, path)
            } else {
                let dest: PathBuf = clone_root.join(Uuid::new_v4().to_string());
                std::fs::create_dir_all(&clone_root).map_err(DomainError::Io)?;
                info!("cloning {url} into {dest:?}");
                let repo = RepoBuilder::new()
                    .clone(&url, &dest)
                    .map_err(|e| DomainError::repository_access(format!("failed to clone {url}: {e}")))?;
                (repo, dest.to_string_lossy().to_string())
            };

            let head = repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(|e| DomainError::repository_access(format!("failed to resolve HEAD: {e}")))?;

            Ok(WorkingTree {
                local_path,
                resolved_commit: head.id().to_string(),
            })
        })
        .await
        .map_err(|e| DomainError::internal(format!("clone task panicked: {e}")))?
    }

    async fn resolve_head(&self, local_path: &str) -> Result<String, DomainError> {
        let local_path = local_path.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, DomainError> {
            let repo = Self::open_blocking(local_path)?;
            let head = repo
                .head()
                .and_then(|h| h.peel_to_commit())
                .map_err(|e| DomainError::repository_access(format!("failed to resolve HEAD: {e}")))?;
            Ok(head.id().to_string())
        })
        .await
        .map_err(|e| DomainError::internal(format!("resolve_head task panicked: {e}")))?
    }

    async fn diff(
        &self,
        local_path: &str,
        from_commit: &str,
        to_commit: &str,
    ) -> Result<Vec<FileChange>, DomainError> {
        let local_path = local_path.to_string();
        let from_commit = from_commit.to_string();
        let to_commit = to_commit.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<FileChange>, DomainError> {
            let repo = Self::open_blocking(local_path)?;

            let from_oid = Oid::from_str(&from_commit)
                .map_err(|e| DomainError::validation(format!("invalid commit {from_commit}: {e}")))?;
            let to_oid = Oid::from_str(&to_commit)
                .map_err(|e| DomainError::validation(format!("invalid commit {to_commit}: {e}")))?;

            let old_tree = repo
                .find_commit(from_oid)
                .and_then(|c| c.tree())
                .map_err(|e| DomainError::repository_access(format!("failed to load tree for {from_commit}: {e}")))?;
            let new_tree = repo
                .find_commit(to_oid)
                .and_then(|c| c.tree())
                .map_err(|e| DomainError::repository_access(format!("failed to load tree for {to_commit}: {e}")))?;

            let mut diff = repo
                .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)
                .map_err(|e| DomainError::repository_access(format!("failed to diff trees: {e}")))?;

            let mut find_opts = DiffFindOptions::new();
            find_opts.renames(true).rename_threshold(50);
            diff.find_similar(Some(&mut find_opts))
                .map_err(|e| DomainError::repository_access(format!("rename detection failed: {e}")))?;

            let mut changes = Vec::new();
            diff.foreach(
                &mut |delta, _| {
                    let old_path = delta.old_file().path().map(|p| p.to_string_lossy().to_string());
                    let new_path = delta.new_file().path().map(|p| p.to_string_lossy().to_string());

                    match delta.status() {
                        Delta::Added => {
                            if let Some(p) = new_path {
                                changes.push(FileChange::Added(p));
                            }
                        }
                        Delta::Deleted => {
                            if let Some(p) = old_path {
                                changes.push(FileChange::Deleted(p));
                            }
                        }
                        Delta::Modified => {
                            if let Some(p) = new_path {
                                changes.push(FileChange::Modified(p));
                            }
                        }
                        Delta::Renamed => {
                            if let (Some(old), Some(new)) = (old_path, new_path) {
                                changes.push(FileChange::Renamed {
                                    old_path: old,
                                    new_path: new,
                                });
                            }
                        }
                        _ => {}
                    }
                    true
                },
                None,
                None,
                None,
            )
            .map_err(|e| DomainError::repository_access(format!("failed to walk diff: {e}")))?;

            debug!("diff {from_commit}..{to_commit} produced {} changes", changes.len());
            changes.sort_by_key(FileChange::apply_priority);
            Ok(changes)
        })
        .await
        .map_err(|e| DomainError::internal(format!("diff task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo_with_commit(dir: &Path, file_name: &str, content: &str) -> (Repository, Oid) {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join(file_name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(file_name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let signature = git2::Signature::now("test", "test@example.com").unwrap();
        let commit_id = repo
            .commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[])
            .unwrap();
        (repo, commit_id)
    }

    #[tokio::test]
    async fn resolve_head_returns_the_tip_commit() {
        let dir = tempfile::tempdir().unwrap();
        let (_repo, commit_id) = init_repo_with_commit(dir.path(), "a.rs", "fn a() {}");

        let source = GitRepositorySource::new(dir.path().to_path_buf());
        let resolved = source.resolve_head(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(resolved, commit_id.to_string());
    }

    #[tokio::test]
    async fn diff_detects_added_file() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, first_commit) = init_repo_with_commit(dir.path(), "a.rs", "fn a() {}");

        std::fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("b.rs")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let signature = git2::Signature::now("test", "test@example.com").unwrap();
        let parent = repo.find_commit(first_commit).unwrap();
        let second_commit = repo
            .commit(Some("HEAD"), &signature, &signature, "add b", &tree, &[&parent])
            .unwrap();

        let source = GitRepositorySource::new(dir.path().to_path_buf());
        let changes = source
            .diff(
                dir.path().to_str().unwrap(),
                &first_commit.to_string(),
                &second_commit.to_string(),
            )
            .await
            .unwrap();

        assert!(changes.iter().any(|c| matches!(c, FileChange::Added(p) if p == "b.rs")));
    }
}

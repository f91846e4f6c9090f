use serde::{Deserialize, Serialize};

/// One file-level delta between two commits, as produced by a
/// `RepositorySource` diff and consumed by the incremental indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileChange {
    Added(String),
    Modified(String),
    Deleted(String),
    Renamed { old_path: String, new_path: String },
}

impl FileChange {
    /// The path an index lookup should key off to remove stale entries
    /// before re-adding, if any.
    pub fn removal_path(&self) -> Option<&str> {
        match self {
            FileChange::Deleted(p) | FileChange::Modified(p) => Some(p),
            FileChange::Renamed { old_path, .. } => Some(old_path),
            FileChange::Added(_) => None,
        }
    }

    /// The path that should be (re-)parsed and added, if any.
    pub fn addition_path(&self) -> Option<&str> {
        match self {
            FileChange::Added(p) | FileChange::Modified(p) => Some(p),
            FileChange::Renamed { new_path, .. } => Some(new_path),
            FileChange::Deleted(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FileChange::Added(_) => "added",
            FileChange::Modified(_) => "modified",
            FileChange::Deleted(_) => "deleted",
            FileChange::Renamed { .. } => "renamed",
        }
    }

    /// Apply order within a batch: deletions first, then renames, then
    /// modifications, then additions — so a rename's removal never races a
    /// later add targeting the same path.
    pub fn apply_priority(&self) -> u8 {
        match self {
            FileChange::Deleted(_) => 0,
            FileChange::Renamed { .. } => 1,
            FileChange::Modified(_) => 2,
            FileChange::Added(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_order_sorts_deletes_before_adds() {
        let mut changes = vec![
            FileChange::Added("new.rs".into()),
            FileChange::Deleted("old.rs".into()),
            FileChange::Renamed {
                old_path: "a.rs".into(),
                new_path: "b.rs".into(),
            },
            FileChange::Modified("c.rs".into()),
        ];
        changes.sort_by_key(FileChange::apply_priority);
        assert_eq!(changes[0].kind(), "deleted");
        assert_eq!(changes[3].kind(), "added");
    }

    #[test]
    fn renamed_removal_and_addition_paths() {
        let change = FileChange::Renamed {
            old_path: "Foo.java".into(),
            new_path: "Bar.java".into(),
        };
        assert_eq!(change.removal_path(), Some("Foo.java"));
        assert_eq!(change.addition_path(), Some("Bar.java"));
    }
}

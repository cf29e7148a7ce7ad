//! Domain model types used throughout MergeFlow.
//!
//! These types describe one point-in-time view of the working directory and
//! the merge-type operation that is in progress over it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::SnapshotError;

// ---------------------------------------------------------------------------
// Operation kind
// ---------------------------------------------------------------------------

/// The merge-type operation whose conflicts are being resolved.
///
/// `Squash` and `Reorder` are interactive rebases that git records the same
/// way as any other rebase, so [`crate::git::detect_operation`] reports them
/// as `Rebase`. Callers that started the squash or reorder themselves pass
/// the specific kind in their `SessionConfig`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Merge,
    Rebase,
    CherryPick,
    /// Squashing commits, performed as an interactive rebase.
    Squash,
    /// Reordering commits, performed as an interactive rebase.
    Reorder,
}

impl OperationKind {
    /// Human readable name used in prompts and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Rebase => "rebase",
            Self::CherryPick => "cherry-pick",
            Self::Squash => "squash",
            Self::Reorder => "reorder",
        }
    }

    /// Whether git runs this operation as a rebase.
    pub fn is_rebase(&self) -> bool {
        matches!(self, Self::Rebase | Self::Squash | Self::Reorder)
    }

    /// Arguments passed to `git` to continue the operation.
    pub fn continue_args(&self) -> &'static [&'static str] {
        match self {
            Self::Merge => &["commit", "--no-edit"],
            Self::Rebase | Self::Squash | Self::Reorder => &["rebase", "--continue"],
            Self::CherryPick => &["cherry-pick", "--continue"],
        }
    }

    /// Arguments passed to `git` to abort the operation.
    pub fn abort_args(&self) -> &'static [&'static str] {
        match self {
            Self::Merge => &["merge", "--abort"],
            Self::Rebase | Self::Squash | Self::Reorder => &["rebase", "--abort"],
            Self::CherryPick => &["cherry-pick", "--abort"],
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// File status
// ---------------------------------------------------------------------------

/// Status of a single path in the working directory.
///
/// The unmerged variants mirror the two-letter codes git reports for index
/// conflicts; the remaining variants are ordinary working-tree states.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileStatusKind {
    /// Both sides changed the file and conflict markers are still present.
    ConflictedWithMarkers { markers: usize },
    /// Both sides changed the file but the markers have been edited away.
    ConflictedWithoutMarkers,
    AddedByUs,
    AddedByThem,
    DeletedByUs,
    DeletedByThem,
    BothDeleted,
    New,
    Modified,
    Deleted,
    Renamed { from: String },
    Copied,
    Untracked,
    /// A status code this crate does not recognize.
    Unknown { code: String },
}

impl FileStatusKind {
    /// Short label for tables and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConflictedWithMarkers { .. } => "conflicted",
            Self::ConflictedWithoutMarkers => "conflict markers removed",
            Self::AddedByUs => "added by us",
            Self::AddedByThem => "added by them",
            Self::DeletedByUs => "deleted by us",
            Self::DeletedByThem => "deleted by them",
            Self::BothDeleted => "deleted by both",
            Self::New => "new",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Renamed { .. } => "renamed",
            Self::Copied => "copied",
            Self::Untracked => "untracked",
            Self::Unknown { .. } => "unknown",
        }
    }
}

impl std::fmt::Display for FileStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictedWithMarkers { markers } => {
                write!(f, "conflicted ({} markers)", markers)
            }
            Self::Renamed { from } => write!(f, "renamed from {}", from),
            Self::Unknown { code } => write!(f, "unknown ({})", code),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// One path and its status kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileStatus {
    /// Repository-relative path using `/` separators.
    pub path: String,
    pub kind: FileStatusKind,
}

impl FileStatus {
    pub fn new(path: impl Into<String>, kind: FileStatusKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable, ordered view of the working directory at one point in time.
///
/// Entry order is display order. A refresh builds a new snapshot rather than
/// editing this one.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WorkingDirectorySnapshot {
    files: Vec<FileStatus>,
}

impl WorkingDirectorySnapshot {
    /// Build a snapshot, rejecting duplicate paths.
    pub fn new(files: Vec<FileStatus>) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if !seen.insert(file.path.as_str()) {
                return Err(SnapshotError::DuplicatePath(file.path.clone()));
            }
        }
        Ok(Self { files })
    }

    /// A snapshot with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileStatus] {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&FileStatus> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileStatus> {
        self.files.iter()
    }
}

impl<'a> IntoIterator for &'a WorkingDirectorySnapshot {
    type Item = &'a FileStatus;
    type IntoIter = std::slice::Iter<'a, FileStatus>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_preserves_order() {
        let snapshot = WorkingDirectorySnapshot::new(vec![
            FileStatus::new("z.rs", FileStatusKind::Modified),
            FileStatus::new("a.rs", FileStatusKind::Untracked),
        ])
        .unwrap();
        let paths: Vec<&str> = snapshot.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["z.rs", "a.rs"]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("a.rs"));
        assert!(!snapshot.contains("b.rs"));
    }

    #[test]
    fn test_snapshot_rejects_duplicate_paths() {
        let result = WorkingDirectorySnapshot::new(vec![
            FileStatus::new("a.rs", FileStatusKind::Modified),
            FileStatus::new("a.rs", FileStatusKind::AddedByUs),
        ]);
        assert!(matches!(result, Err(SnapshotError::DuplicatePath(p)) if p == "a.rs"));
    }

    #[test]
    fn test_operation_commands() {
        assert_eq!(OperationKind::Merge.abort_args(), &["merge", "--abort"]);
        assert_eq!(OperationKind::Squash.continue_args(), &["rebase", "--continue"]);
        assert_eq!(
            OperationKind::CherryPick.continue_args(),
            &["cherry-pick", "--continue"]
        );
    }

    #[test]
    fn test_rebase_family() {
        assert!(OperationKind::Squash.is_rebase());
        assert!(OperationKind::Reorder.is_rebase());
        assert!(!OperationKind::CherryPick.is_rebase());
        assert!(!OperationKind::Merge.is_rebase());
    }

    #[test]
    fn test_status_kind_display() {
        assert_eq!(
            FileStatusKind::ConflictedWithMarkers { markers: 3 }.to_string(),
            "conflicted (3 markers)"
        );
        assert_eq!(FileStatusKind::DeletedByThem.to_string(), "deleted by them");
        assert_eq!(
            FileStatusKind::Renamed { from: "old.rs".into() }.to_string(),
            "renamed from old.rs"
        );
    }

    #[test]
    fn test_status_kind_serializes_tagged() {
        let json = serde_json::to_string(&FileStatus::new(
            "a.rs",
            FileStatusKind::ConflictedWithMarkers { markers: 2 },
        ))
        .unwrap();
        assert_eq!(
            json,
            r#"{"path":"a.rs","kind":{"kind":"conflicted_with_markers","markers":2}}"#
        );
    }
}

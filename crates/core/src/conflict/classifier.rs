//! Conflict classification.
//!
//! Given a [`WorkingDirectorySnapshot`] and the session's
//! [`ManualResolutions`], the classifier derives which files take part in the
//! operation (unmerged), which of those still block it (conflicted), and which
//! no longer do (resolved). Every function here is pure and keeps snapshot
//! order, so callers can re-run it on every refresh.

use serde::Serialize;
use tracing::debug;

use crate::conflict::resolution::{ManualResolution, ManualResolutions};
use crate::models::{FileStatus, FileStatusKind, WorkingDirectorySnapshot};

// ---------------------------------------------------------------------------
// Status-kind predicates
// ---------------------------------------------------------------------------

/// Whether `kind` is inherently conflict-bearing, i.e. the file takes part in
/// the operation and gets per-file conflict UI.
pub fn is_conflicted_file(kind: &FileStatusKind) -> bool {
    has_content_conflict(kind) || requires_manual_resolution(kind)
}

/// Whether `kind` can only be settled by the user picking a side.
pub fn requires_manual_resolution(kind: &FileStatusKind) -> bool {
    matches!(
        kind,
        FileStatusKind::AddedByUs
            | FileStatusKind::AddedByThem
            | FileStatusKind::DeletedByUs
            | FileStatusKind::DeletedByThem
            | FileStatusKind::BothDeleted
    )
}

/// Whether the file on disk still contains conflict markers.
pub fn has_unresolved_markers(kind: &FileStatusKind) -> bool {
    matches!(kind, FileStatusKind::ConflictedWithMarkers { markers } if *markers > 0)
}

/// Both-sides content conflicts, with or without markers left on disk.
fn has_content_conflict(kind: &FileStatusKind) -> bool {
    matches!(
        kind,
        FileStatusKind::ConflictedWithMarkers { .. } | FileStatusKind::ConflictedWithoutMarkers
    )
}

/// Whether a single unmerged file still blocks the operation.
///
/// Any manual resolution, whatever its outcome, clears the file. The chosen
/// outcome is not checked against the file content.
pub fn has_unresolved_conflicts(
    kind: &FileStatusKind,
    resolution: Option<ManualResolution>,
) -> bool {
    if resolution.is_some() {
        return false;
    }
    requires_manual_resolution(kind) || has_unresolved_markers(kind)
}

// ---------------------------------------------------------------------------
// Derived sets
// ---------------------------------------------------------------------------

/// Files taking part in the current operation, resolved or not.
pub fn unmerged_files(snapshot: &WorkingDirectorySnapshot) -> Vec<&FileStatus> {
    snapshot
        .iter()
        .filter(|f| is_conflicted_file(&f.kind))
        .collect()
}

/// Unmerged files that still block the operation.
pub fn conflicted_files<'a>(
    snapshot: &'a WorkingDirectorySnapshot,
    resolutions: &ManualResolutions,
) -> Vec<&'a FileStatus> {
    snapshot
        .iter()
        .filter(|f| is_conflicted_file(&f.kind))
        .filter(|f| has_unresolved_conflicts(&f.kind, resolutions.get(&f.path)))
        .collect()
}

/// Unmerged files that no longer block the operation.
pub fn resolved_files<'a>(
    snapshot: &'a WorkingDirectorySnapshot,
    resolutions: &ManualResolutions,
) -> Vec<&'a FileStatus> {
    snapshot
        .iter()
        .filter(|f| is_conflicted_file(&f.kind))
        .filter(|f| !has_unresolved_conflicts(&f.kind, resolutions.get(&f.path)))
        .collect()
}

/// All three derived sets for one snapshot/registry pair.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConflictSet<'a> {
    pub unmerged: Vec<&'a FileStatus>,
    pub conflicted: Vec<&'a FileStatus>,
    pub resolved: Vec<&'a FileStatus>,
}

impl ConflictSet<'_> {
    /// True when nothing blocks the operation any more.
    pub fn is_fully_resolved(&self) -> bool {
        self.conflicted.is_empty()
    }
}

/// Compute unmerged, conflicted and resolved files in one pass.
pub fn classify<'a>(
    snapshot: &'a WorkingDirectorySnapshot,
    resolutions: &ManualResolutions,
) -> ConflictSet<'a> {
    let mut set = ConflictSet {
        unmerged: Vec::new(),
        conflicted: Vec::new(),
        resolved: Vec::new(),
    };

    for file in snapshot.iter().filter(|f| is_conflicted_file(&f.kind)) {
        set.unmerged.push(file);
        if has_unresolved_conflicts(&file.kind, resolutions.get(&file.path)) {
            set.conflicted.push(file);
        } else {
            set.resolved.push(file);
        }
    }

    debug!(
        total = snapshot.len(),
        unmerged = set.unmerged.len(),
        conflicted = set.conflicted.len(),
        resolved = set.resolved.len(),
        "classified working directory"
    );
    set
}

//! Working-directory snapshots read with `git2`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use git2::{Repository, Status, StatusOptions};
use tracing::{debug, info, instrument};

use crate::errors::SnapshotError;
use crate::models::{FileStatus, FileStatusKind, WorkingDirectorySnapshot};
use crate::workflow::SnapshotSource;

/// Conflict marker prefixes as written by git, each exactly seven characters.
const MARKER_PREFIXES: [&str; 4] = ["<<<<<<<", "|||||||", "=======", ">>>>>>>"];

/// Reads [`WorkingDirectorySnapshot`]s from a git working tree.
#[derive(Debug, Clone)]
pub struct GitStatusReader {
    repo_path: PathBuf,
}

/// Which index stages exist for a conflicted path.
#[derive(Debug, Clone, Copy, Default)]
struct ConflictStages {
    ancestor: bool,
    ours: bool,
    theirs: bool,
}

impl GitStatusReader {
    /// Target the repository at (or above) `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, SnapshotError> {
        let path = repo_path.as_ref();
        let repo = Repository::discover(path)
            .map_err(|_| SnapshotError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| SnapshotError::BareRepository(path.display().to_string()))?
            .to_path_buf();
        info!(path = %workdir.display(), "reading status from git repository");
        Ok(Self { repo_path: workdir })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Build a snapshot of every changed, untracked or unmerged path.
    #[instrument(skip(self), fields(repo = %self.repo_path.display()))]
    pub fn snapshot(&self) -> Result<WorkingDirectorySnapshot, SnapshotError> {
        let repo = Repository::open(&self.repo_path)?;
        let stages = conflict_stages(&repo)?;

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .renames_head_to_index(true);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut files = Vec::with_capacity(statuses.len());

        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_ignored() {
                continue;
            }

            // `path()` names the old side of a rename, so take both ends
            // from the delta instead.
            if status.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) && !status.is_conflicted()
            {
                let delta = entry
                    .head_to_index()
                    .or_else(|| entry.index_to_workdir())
                    .ok_or(SnapshotError::InvalidPath)?;
                let to = delta_path(delta.new_file().path())?;
                let from = delta_path(delta.old_file().path())?;
                files.push(FileStatus::new(to, FileStatusKind::Renamed { from }));
                continue;
            }

            let path = entry.path().ok_or(SnapshotError::InvalidPath)?.to_string();
            let kind = if status.is_conflicted() {
                let stage = stages.get(&path).copied().unwrap_or_default();
                self.conflict_kind(&path, stage)?
            } else {
                plain_kind(status)
            };

            files.push(FileStatus::new(path, kind));
        }

        debug!(count = files.len(), "status snapshot built");
        WorkingDirectorySnapshot::new(files)
    }

    /// Classify a conflicted path from its index stages, scanning the
    /// working-tree file for markers when both sides have content.
    fn conflict_kind(
        &self,
        path: &str,
        stage: ConflictStages,
    ) -> Result<FileStatusKind, SnapshotError> {
        let kind = match (stage.ancestor, stage.ours, stage.theirs) {
            (_, true, true) => {
                let markers = self.marker_count(path)?;
                if markers > 0 {
                    FileStatusKind::ConflictedWithMarkers { markers }
                } else {
                    FileStatusKind::ConflictedWithoutMarkers
                }
            }
            (true, false, true) => FileStatusKind::DeletedByUs,
            (true, true, false) => FileStatusKind::DeletedByThem,
            (false, true, false) => FileStatusKind::AddedByUs,
            (false, false, true) => FileStatusKind::AddedByThem,
            (true, false, false) => FileStatusKind::BothDeleted,
            (false, false, false) => FileStatusKind::Unknown { code: "UU?".into() },
        };
        Ok(kind)
    }

    fn marker_count(&self, path: &str) -> Result<usize, SnapshotError> {
        match std::fs::read(self.repo_path.join(path)) {
            Ok(bytes) => Ok(count_conflict_markers(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(source) => Err(SnapshotError::ReadFailed {
                path: path.to_string(),
                source,
            }),
        }
    }
}

impl SnapshotSource for GitStatusReader {
    fn read_snapshot(&self) -> Result<WorkingDirectorySnapshot, SnapshotError> {
        self.snapshot()
    }
}

/// Count conflict marker lines the way `git diff --check` reports them.
pub fn count_conflict_markers(content: &str) -> usize {
    content
        .lines()
        .filter(|line| {
            MARKER_PREFIXES.iter().any(|prefix| {
                line.strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
            })
        })
        .count()
}

fn conflict_stages(repo: &Repository) -> Result<HashMap<String, ConflictStages>, SnapshotError> {
    let index = repo.index()?;
    let mut stages = HashMap::new();
    if !index.has_conflicts() {
        return Ok(stages);
    }

    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let path = [&conflict.our, &conflict.their, &conflict.ancestor]
            .into_iter()
            .flatten()
            .next()
            .map(|entry| String::from_utf8(entry.path.clone()))
            .transpose()
            .map_err(|_| SnapshotError::InvalidPath)?;

        if let Some(path) = path {
            stages.insert(
                path,
                ConflictStages {
                    ancestor: conflict.ancestor.is_some(),
                    ours: conflict.our.is_some(),
                    theirs: conflict.their.is_some(),
                },
            );
        }
    }
    Ok(stages)
}

/// Repository-relative `/`-separated path from a diff file.
fn delta_path(path: Option<&Path>) -> Result<String, SnapshotError> {
    path.and_then(Path::to_str)
        .map(|p| p.replace('\\', "/"))
        .ok_or(SnapshotError::InvalidPath)
}

fn plain_kind(status: Status) -> FileStatusKind {
    if status.contains(Status::WT_NEW) && !status.intersects(index_bits()) {
        FileStatusKind::Untracked
    } else if status.contains(Status::INDEX_NEW) {
        FileStatusKind::New
    } else if status.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
        FileStatusKind::Deleted
    } else if status.intersects(
        Status::INDEX_MODIFIED
            | Status::WT_MODIFIED
            | Status::INDEX_TYPECHANGE
            | Status::WT_TYPECHANGE,
    ) {
        FileStatusKind::Modified
    } else {
        FileStatusKind::Unknown {
            code: format!("{:#x}", status.bits()),
        }
    }
}

fn index_bits() -> Status {
    Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE
}

//! Detecting which merge-type operation is in progress.

use std::path::Path;

use git2::{Repository, RepositoryState};
use serde::Serialize;
use tracing::debug;

use crate::errors::OperationError;
use crate::models::OperationKind;

/// The in-progress operation and the two sides it combines.
///
/// `our_branch` and `their_branch` follow git's `--ours` / `--theirs`, so
/// during a rebase `our_branch` is the upstream and `their_branch` is the
/// branch being replayed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OperationContext {
    pub kind: OperationKind,
    pub our_branch: String,
    pub their_branch: Option<String>,
}

/// Map the repository state to an [`OperationKind`], if any.
pub fn detect_operation(repo: &Repository) -> Option<OperationKind> {
    match repo.state() {
        RepositoryState::Merge => Some(OperationKind::Merge),
        RepositoryState::Rebase
        | RepositoryState::RebaseInteractive
        | RepositoryState::RebaseMerge
        | RepositoryState::ApplyMailboxOrRebase => Some(OperationKind::Rebase),
        RepositoryState::CherryPick | RepositoryState::CherryPickSequence => {
            Some(OperationKind::CherryPick)
        }
        _ => None,
    }
}

/// Inspect the repository at `path` for an in-progress operation.
///
/// Returns `Ok(None)` when the repository is in a clean state.
pub fn inspect_operation<P: AsRef<Path>>(
    path: P,
) -> Result<Option<OperationContext>, OperationError> {
    let repo = Repository::discover(path.as_ref())?;
    let Some(kind) = detect_operation(&repo) else {
        return Ok(None);
    };
    let git_dir = repo.path();

    let (our_branch, their_branch) = match kind {
        OperationKind::Merge => (head_name(&repo), read_short_ref(git_dir, "MERGE_HEAD")),
        OperationKind::CherryPick => (head_name(&repo), read_short_ref(git_dir, "CHERRY_PICK_HEAD")),
        // A rebase replays the branch onto `onto`, so git's "ours" is the
        // upstream side and "theirs" is the branch being rebased.
        _ => {
            let state_dir = ["rebase-merge", "rebase-apply"]
                .into_iter()
                .map(|d| git_dir.join(d))
                .find(|d| d.is_dir());
            let ours = state_dir
                .as_ref()
                .and_then(|d| read_trimmed(&d.join("onto")))
                .map(|sha| short_sha(&sha))
                .unwrap_or_else(|| head_name(&repo));
            let theirs = state_dir
                .as_ref()
                .and_then(|d| read_trimmed(&d.join("head-name")))
                .map(|name| name.trim_start_matches("refs/heads/").to_string());
            (ours, theirs)
        }
    };

    debug!(%kind, our_branch = %our_branch, ?their_branch, "detected operation");
    Ok(Some(OperationContext {
        kind,
        our_branch,
        their_branch,
    }))
}

/// Branch shorthand for HEAD, or the short commit id when detached.
fn head_name(repo: &Repository) -> String {
    match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().unwrap_or("HEAD").to_string(),
        Ok(head) => head
            .target()
            .map(|oid| short_sha(&oid.to_string()))
            .unwrap_or_else(|| "HEAD".to_string()),
        Err(_) => "HEAD".to_string(),
    }
}

fn read_short_ref(git_dir: &Path, name: &str) -> Option<String> {
    read_trimmed(&git_dir.join(name))
        .and_then(|contents| contents.lines().next().map(short_sha))
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

//! Continuing and aborting operations through the `git` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::GitConfig;
use crate::conflict::classifier::unmerged_files;
use crate::conflict::resolution::{ManualResolution, ManualResolutions};
use crate::errors::OperationError;
use crate::models::{FileStatusKind, OperationKind, WorkingDirectorySnapshot};
use crate::workflow::OperationBackend;

/// Runs `git` in a working tree to finish or abandon an operation.
#[derive(Debug, Clone)]
pub struct GitCliBackend {
    repo_path: PathBuf,
    operation: OperationKind,
    binary: String,
    continue_editor: String,
}

impl GitCliBackend {
    pub fn new(repo_path: impl Into<PathBuf>, operation: OperationKind, config: &GitConfig) -> Self {
        let backend = Self {
            repo_path: repo_path.into(),
            operation,
            binary: config.binary.clone(),
            continue_editor: config.continue_editor.clone(),
        };
        info!(
            path = %backend.repo_path.display(),
            operation = %operation,
            binary = %backend.binary,
            "created GitCliBackend"
        );
        backend
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Check out the chosen side for every manually resolved file, then
    /// stage every unmerged path.
    async fn stage_resolutions(
        &self,
        snapshot: &WorkingDirectorySnapshot,
        resolutions: &ManualResolutions,
    ) -> Result<(), OperationError> {
        for file in unmerged_files(snapshot) {
            let path = file.path.as_str();
            if let Some(side @ (ManualResolution::Ours | ManualResolution::Theirs)) =
                resolutions.get(path)
            {
                if side_is_missing(&file.kind, side) {
                    self.run_git(&["rm", "--quiet", "--", path]).await?;
                } else {
                    let flag = if side == ManualResolution::Ours {
                        "--ours"
                    } else {
                        "--theirs"
                    };
                    self.run_git(&["checkout", flag, "--", path]).await?;
                }
                debug!(path, %side, "applied manual resolution");
            }

            if tokio::fs::try_exists(self.repo_path.join(path)).await? {
                self.run_git(&["add", "--", path]).await?;
            } else {
                self.run_git(&["rm", "--cached", "--quiet", "--ignore-unmatch", "--", path])
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_git(&self, args: &[&str]) -> Result<String, OperationError> {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.repo_path)
            .args(args)
            .env("GIT_EDITOR", &self.continue_editor)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("git {}", args.join(" ")), "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OperationError::BinaryNotFound(self.binary.clone())
            } else {
                OperationError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "git command failed");
            return Err(OperationError::CommandFailed { exit_code, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl OperationBackend for GitCliBackend {
    #[instrument(skip(self, snapshot, resolutions), fields(operation = %self.operation))]
    async fn continue_operation(
        &self,
        snapshot: &WorkingDirectorySnapshot,
        resolutions: &ManualResolutions,
        our_branch: &str,
        their_branch: Option<&str>,
    ) -> Result<(), OperationError> {
        info!(
            our_branch,
            their_branch = their_branch.unwrap_or("-"),
            "continuing operation"
        );
        self.stage_resolutions(snapshot, resolutions).await?;
        self.run_git(self.operation.continue_args()).await?;
        info!("operation continued");
        Ok(())
    }

    #[instrument(skip(self, snapshot, resolutions), fields(operation = %self.operation))]
    async fn abort_operation(
        &self,
        snapshot: &WorkingDirectorySnapshot,
        resolutions: &ManualResolutions,
    ) -> Result<(), OperationError> {
        info!(
            files = snapshot.len(),
            discarded_resolutions = resolutions.len(),
            "aborting operation"
        );
        self.run_git(self.operation.abort_args()).await?;
        info!("operation aborted");
        Ok(())
    }
}

/// Whether the chosen side has no content for this path, so resolving to
/// it means deleting the file.
fn side_is_missing(kind: &FileStatusKind, side: ManualResolution) -> bool {
    match side {
        ManualResolution::Ours => matches!(
            kind,
            FileStatusKind::DeletedByUs | FileStatusKind::AddedByThem | FileStatusKind::BothDeleted
        ),
        ManualResolution::Theirs => matches!(
            kind,
            FileStatusKind::DeletedByThem | FileStatusKind::AddedByUs | FileStatusKind::BothDeleted
        ),
        _ => false,
    }
}

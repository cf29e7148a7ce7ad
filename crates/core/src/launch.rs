//! Opening conflicted files in an editor and the repository in a shell.
//!
//! These are side actions for the presentation layer. They never touch the
//! session state, and a failure only affects the action that was asked for.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::config::LaunchConfig;
use crate::errors::LaunchError;

/// Spawns the configured editor and shell inside a repository.
#[derive(Debug, Clone)]
pub struct Launcher {
    repo_path: PathBuf,
    editor: Option<String>,
    wait_for_editor: bool,
    shell: Option<String>,
}

impl Launcher {
    /// Build a launcher from a config whose env vars were already resolved.
    pub fn new(repo_path: impl Into<PathBuf>, config: &LaunchConfig) -> Self {
        Self {
            repo_path: repo_path.into(),
            editor: config.editor.clone(),
            wait_for_editor: config.wait_for_editor,
            shell: config.shell.clone(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Open a repository-relative path in the external editor.
    pub fn open_in_editor(&self, path: &str) -> Result<(), LaunchError> {
        let command_line = self
            .editor
            .as_deref()
            .ok_or_else(|| LaunchError::NotConfigured("editor".into()))?;
        let (program, args) = split_command(command_line)
            .ok_or_else(|| LaunchError::NotConfigured("editor".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(self.repo_path.join(path))
            .current_dir(&self.repo_path);

        info!(program, path, wait = self.wait_for_editor, "opening file in editor");
        if self.wait_for_editor {
            let status = cmd.status().map_err(|source| LaunchError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;
            if !status.success() {
                warn!(program, ?status, "editor exited with failure");
            }
        } else {
            cmd.spawn().map_err(|source| LaunchError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Start an interactive shell in the repository and wait for it to exit.
    pub fn open_in_shell(&self) -> Result<(), LaunchError> {
        let command_line = self
            .shell
            .as_deref()
            .ok_or_else(|| LaunchError::NotConfigured("shell".into()))?;
        let (program, args) = split_command(command_line)
            .ok_or_else(|| LaunchError::NotConfigured("shell".into()))?;

        info!(program, repo = %self.repo_path.display(), "opening repository in shell");
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.repo_path)
            .status()
            .map_err(|source| LaunchError::SpawnFailed {
                program: program.to_string(),
                source,
            })?;
        if !status.success() {
            warn!(program, ?status, "shell exited with failure");
        }
        Ok(())
    }
}

/// Split `code --wait` into the program and its leading arguments.
fn split_command(command_line: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = command_line.split_whitespace();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

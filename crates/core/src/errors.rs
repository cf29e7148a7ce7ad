//! Error types for the MergeFlow core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

/// Errors from building or reading a working-directory snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The same path was listed twice in one snapshot.
    #[error("path '{0}' appears more than once in the snapshot")]
    DuplicatePath(String),

    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// The repository has no working directory.
    #[error("repository at '{0}' is bare")]
    BareRepository(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A path reported by git is not valid UTF-8.
    #[error("non UTF-8 path in repository status")]
    InvalidPath,

    /// Reading a working-tree file failed.
    #[error("failed to read '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Operation errors
// ---------------------------------------------------------------------------

/// Errors raised by the collaborators that continue or abort an operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("operation I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Workflow errors
// ---------------------------------------------------------------------------

/// Errors from the conflict workflow controller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Submit or abort is already running for this session.
    #[error("a {0} is already in progress for this session")]
    ActionInProgress(String),

    /// Submit was requested while files are still conflicted.
    #[error("{count} conflicted file(s) must be resolved before continuing")]
    ConflictsRemain { count: usize },

    /// The session was already dismissed.
    #[error("conflict session {0} has already ended")]
    SessionEnded(String),

    /// The path is not part of the current operation.
    #[error("'{0}' is not an unmerged file in this session")]
    NotUnmerged(String),

    /// Refreshing the snapshot failed.
    #[error("workflow snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The continue/abort collaborator failed.
    #[error("workflow operation failed: {0}")]
    Operation(#[from] OperationError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Launch errors
// ---------------------------------------------------------------------------

/// Errors from spawning an external editor or shell.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Neither the config nor the environment names a program to run.
    #[error("no {0} configured")]
    NotConfigured(String),

    /// The program could not be spawned.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

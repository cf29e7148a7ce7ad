//! MergeFlow core library.
//!
//! This crate tracks and drives the resolution of conflicts left behind by a
//! merge, rebase, cherry-pick, squash or reorder: working-directory
//! snapshots, conflict classification, manual resolutions, the one-shot
//! resolution notification, the submit/abort session controller, and the git
//! adapters that feed and execute it.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod git;
pub mod launch;
pub mod models;
pub mod workflow;

// Re-exports for convenience.
pub use config::MergeFlowConfig;
pub use conflict::{ManualResolution, ManualResolutions};
pub use models::{FileStatus, FileStatusKind, OperationKind, WorkingDirectorySnapshot};
pub use workflow::{ConflictSession, OperationBackend, SessionConfig, SessionHost, SnapshotSource};

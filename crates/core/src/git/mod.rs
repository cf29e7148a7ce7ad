//! Git adapters: status snapshots, operation detection, and the CLI backend.

pub mod backend;
pub mod operation;
pub mod status;

pub use backend::GitCliBackend;
pub use operation::{detect_operation, inspect_operation, OperationContext};
pub use status::{count_conflict_markers, GitStatusReader};

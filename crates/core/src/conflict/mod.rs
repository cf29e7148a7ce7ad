//! Conflict classification, manual resolutions, and resolution progress.
//!
//! The conflict subsystem is responsible for:
//! 1. **Classification** -- deriving unmerged, conflicted and resolved files
//!    from a snapshot and the session's manual resolutions.
//! 2. **Resolution** -- recording the side the user picked for a path.
//! 3. **Progress** -- firing a single notification once something resolved.

pub mod classifier;
pub mod progress;
pub mod resolution;

pub use classifier::{
    classify, conflicted_files, has_unresolved_markers, is_conflicted_file,
    requires_manual_resolution, resolved_files, unmerged_files, ConflictSet,
};
pub use progress::{CheckpointOutcome, ResolutionProgress};
pub use resolution::{ManualResolution, ManualResolutions};

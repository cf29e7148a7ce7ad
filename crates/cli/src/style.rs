//! Shared styling utilities for terminal output.

use console::Style;

use mergeflow_core::workflow::FileState;
use mergeflow_core::{ManualResolution, OperationKind};

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Colored label for a file's resolution state.
pub fn file_state(state: &FileState) -> String {
    match state {
        FileState::Conflicted => Style::new().red().bold().apply_to("conflicted").to_string(),
        FileState::ResolvedByEdit => Style::new().green().apply_to("resolved").to_string(),
        FileState::ResolvedManually(resolution) => {
            let label = match resolution {
                ManualResolution::Ours => "using ours",
                ManualResolution::Theirs => "using theirs",
                ManualResolution::MarkersRemoved => "marked resolved",
                ManualResolution::None => "resolved",
            };
            Style::new().green().apply_to(label).to_string()
        }
    }
}

/// One-line description of the operation, e.g. `merge of feature into main`.
///
/// During a rebase git's "ours" is the upstream, so the branch being
/// replayed is the one named first.
pub fn operation_title(kind: OperationKind, ours: &str, theirs: Option<&str>) -> String {
    match theirs {
        Some(theirs) if kind.is_rebase() => format!("{} of {} onto {}", kind, theirs, ours),
        Some(theirs) => format!("{} of {} into {}", kind, theirs, ours),
        None => format!("{} onto {}", kind, ours),
    }
}

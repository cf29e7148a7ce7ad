//! One-shot "conflicts resolved" notification.
//!
//! The tracker is checked once, when a conflict session is torn down. It
//! fires its notification the first time it sees at least one resolved file
//! and never again afterwards.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::conflict::classifier::resolved_files;
use crate::conflict::resolution::ManualResolutions;
use crate::models::WorkingDirectorySnapshot;

/// What a checkpoint did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// The caller already knew conflicts were resolved; nothing was computed.
    Skipped,
    /// No file was resolved in this session.
    NothingResolved,
    /// The notification had already fired for this session.
    AlreadyNotified,
    /// The notification fired now.
    Notified,
}

/// Tracks whether the resolved notification has fired for one session.
#[derive(Debug, Default)]
pub struct ResolutionProgress {
    notified: AtomicBool,
}

impl ResolutionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the notification has fired.
    pub fn has_notified(&self) -> bool {
        self.notified.load(Ordering::SeqCst)
    }

    /// Run the teardown checkpoint.
    ///
    /// When `already_resolved` is set the resolved set is not computed at
    /// all. Otherwise `notify` runs if at least one file is resolved and the
    /// notification has not fired before.
    pub fn checkpoint<F>(
        &self,
        already_resolved: bool,
        snapshot: &WorkingDirectorySnapshot,
        resolutions: &ManualResolutions,
        notify: F,
    ) -> CheckpointOutcome
    where
        F: FnOnce(),
    {
        if already_resolved {
            debug!("conflicts already reported resolved, skipping checkpoint");
            return CheckpointOutcome::Skipped;
        }

        let resolved = resolved_files(snapshot, resolutions);
        if resolved.is_empty() {
            debug!("no resolved files at checkpoint");
            return CheckpointOutcome::NothingResolved;
        }

        if self
            .notified
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CheckpointOutcome::AlreadyNotified;
        }

        info!(resolved = resolved.len(), "conflicts resolved");
        notify();
        CheckpointOutcome::Notified
    }
}

//! Conflict resolution session controller.
//!
//! A [`ConflictSession`] owns the current snapshot and the manual resolutions
//! for one run of the conflict workflow. It gates the two terminal actions:
//!
//! 1. **Submit** -- continue the operation once nothing is conflicted.
//! 2. **Abort** -- abandon the operation, allowed at any time.
//!
//! Only one action runs at a time. Whichever one finishes ends the session,
//! success or not, and session end runs the resolution-progress checkpoint
//! exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::classifier::{classify, conflicted_files, is_conflicted_file};
use crate::conflict::progress::{CheckpointOutcome, ResolutionProgress};
use crate::conflict::resolution::{ManualResolution, ManualResolutions};
use crate::errors::{OperationError, SnapshotError, WorkflowError};
use crate::models::{FileStatusKind, OperationKind, WorkingDirectorySnapshot};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Supplies a fresh snapshot of the working directory.
pub trait SnapshotSource: Send + Sync {
    fn read_snapshot(&self) -> Result<WorkingDirectorySnapshot, SnapshotError>;
}

/// Performs the version-control side of the terminal actions.
#[async_trait]
pub trait OperationBackend: Send + Sync {
    /// Continue the operation, applying the user's manual resolutions.
    async fn continue_operation(
        &self,
        snapshot: &WorkingDirectorySnapshot,
        resolutions: &ManualResolutions,
        our_branch: &str,
        their_branch: Option<&str>,
    ) -> Result<(), OperationError>;

    /// Abort the operation and restore the pre-operation state.
    async fn abort_operation(
        &self,
        snapshot: &WorkingDirectorySnapshot,
        resolutions: &ManualResolutions,
    ) -> Result<(), OperationError>;
}

/// Receives session-level events.
pub trait SessionHost: Send + Sync {
    /// Fired at most once per session, when at least one conflict was
    /// resolved by the time the session ended.
    fn conflicts_resolved(&self);

    /// The session is over and its presentation should be dismissed.
    fn session_ended(&self, outcome: SessionOutcome);
}

impl<T: SessionHost + ?Sized> SessionHost for Arc<T> {
    fn conflicts_resolved(&self) {
        (**self).conflicts_resolved();
    }

    fn session_ended(&self, outcome: SessionOutcome) {
        (**self).session_ended(outcome);
    }
}

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// Static facts about the operation a session resolves.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub operation: OperationKind,
    /// Branch (or commit) the operation is applied onto.
    pub our_branch: String,
    /// Branch (or commit) being brought in, when known.
    pub their_branch: Option<String>,
    /// The host already knows conflicts were resolved in this session.
    pub already_resolved: bool,
}

/// The two terminal actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Abort,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Progress of one action track.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionProgress {
    Idle,
    InProgress,
}

/// Progress of both action tracks, exposed separately.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ActionState {
    pub submit: ActionProgress,
    pub abort: ActionProgress,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Continued,
    ContinueFailed,
    Aborted,
    AbortFailed,
    Dismissed,
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continued => write!(f, "continued"),
            Self::ContinueFailed => write!(f, "continue_failed"),
            Self::Aborted => write!(f, "aborted"),
            Self::AbortFailed => write!(f, "abort_failed"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// Availability of the submit control.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmitControl {
    pub enabled: bool,
    /// Why the control is disabled by remaining conflicts.
    pub tooltip: Option<String>,
}

/// How a single unmerged file is presented.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", content = "resolution", rename_all = "snake_case")]
pub enum FileState {
    Conflicted,
    /// Resolved by editing the file on disk.
    ResolvedByEdit,
    /// Resolved by an explicit user choice.
    ResolvedManually(ManualResolution),
}

/// One row of the per-file conflict list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileView {
    pub path: String,
    pub kind: FileStatusKind,
    pub state: FileState,
}

struct SessionState {
    snapshot: Arc<WorkingDirectorySnapshot>,
    resolutions: ManualResolutions,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One run of the conflict resolution workflow.
pub struct ConflictSession<B, H> {
    id: Uuid,
    config: SessionConfig,
    backend: B,
    host: H,
    state: Mutex<SessionState>,
    /// Set while either action runs.
    busy: AtomicBool,
    submitting: AtomicBool,
    aborting: AtomicBool,
    ended: AtomicBool,
    progress: ResolutionProgress,
    started_at: DateTime<Utc>,
}

impl<B, H> ConflictSession<B, H>
where
    B: OperationBackend,
    H: SessionHost,
{
    /// Start a session over `snapshot` with an empty resolution registry.
    pub fn new(config: SessionConfig, snapshot: WorkingDirectorySnapshot, backend: B, host: H) -> Self {
        let id = Uuid::new_v4();
        info!(
            session = %id,
            operation = %config.operation,
            our_branch = %config.our_branch,
            their_branch = config.their_branch.as_deref().unwrap_or("-"),
            files = snapshot.len(),
            "starting conflict session"
        );
        Self {
            id,
            config,
            backend,
            host,
            state: Mutex::new(SessionState {
                snapshot: Arc::new(snapshot),
                resolutions: ManualResolutions::new(),
            }),
            busy: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
            aborting: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            progress: ResolutionProgress::new(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<WorkingDirectorySnapshot> {
        self.lock_state().snapshot.clone()
    }

    /// A copy of the current manual resolutions.
    pub fn resolutions(&self) -> ManualResolutions {
        self.lock_state().resolutions.clone()
    }

    // -----------------------------------------------------------------------
    // Presentation
    // -----------------------------------------------------------------------

    pub fn action_state(&self) -> ActionState {
        let progress = |flag: &AtomicBool| {
            if flag.load(Ordering::SeqCst) {
                ActionProgress::InProgress
            } else {
                ActionProgress::Idle
            }
        };
        ActionState {
            submit: progress(&self.submitting),
            abort: progress(&self.aborting),
        }
    }

    /// Number of files still blocking the operation.
    pub fn conflicted_count(&self) -> usize {
        let state = self.lock_state();
        conflicted_files(&state.snapshot, &state.resolutions).len()
    }

    /// Whether the submit control should be enabled, and why not.
    pub fn submit_control(&self) -> SubmitControl {
        let conflicted = self.conflicted_count();
        let tooltip = (conflicted > 0).then(|| {
            format!(
                "Resolve {} conflicted file{} before continuing the {}",
                conflicted,
                if conflicted == 1 { "" } else { "s" },
                self.config.operation
            )
        });
        SubmitControl {
            enabled: conflicted == 0 && !self.busy.load(Ordering::SeqCst) && !self.has_ended(),
            tooltip,
        }
    }

    /// Whether the abort control should be enabled.
    pub fn abort_enabled(&self) -> bool {
        !self.busy.load(Ordering::SeqCst) && !self.has_ended()
    }

    /// Per-file rows for every unmerged file, in snapshot order.
    pub fn file_views(&self) -> Vec<FileView> {
        let state = self.lock_state();
        let set = classify(&state.snapshot, &state.resolutions);
        set.unmerged
            .iter()
            .map(|file| {
                let state = if set.conflicted.iter().any(|c| c.path == file.path) {
                    FileState::Conflicted
                } else {
                    match state.resolutions.get(&file.path) {
                        Some(resolution) => FileState::ResolvedManually(resolution),
                        None => FileState::ResolvedByEdit,
                    }
                };
                FileView {
                    path: file.path.clone(),
                    kind: file.kind.clone(),
                    state,
                }
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // User edits
    // -----------------------------------------------------------------------

    /// Record the user's choice for an unmerged path.
    pub fn resolve(&self, path: &str, resolution: ManualResolution) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        let mut state = self.lock_state();
        let unmerged = state
            .snapshot
            .get(path)
            .is_some_and(|f| is_conflicted_file(&f.kind));
        if !unmerged {
            return Err(WorkflowError::NotUnmerged(path.to_string()));
        }
        state.resolutions.set(path, resolution);
        info!(session = %self.id, path, %resolution, "manual resolution recorded");
        Ok(())
    }

    /// Drop the user's choice for `path`, if any.
    pub fn clear_resolution(&self, path: &str) -> Result<Option<ManualResolution>, WorkflowError> {
        self.ensure_editable()?;
        let previous = self.lock_state().resolutions.remove(path);
        debug!(session = %self.id, path, "manual resolution cleared");
        Ok(previous)
    }

    /// Replace the snapshot wholesale.
    pub fn replace_snapshot(&self, snapshot: WorkingDirectorySnapshot) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        debug!(session = %self.id, files = snapshot.len(), "snapshot replaced");
        self.lock_state().snapshot = Arc::new(snapshot);
        Ok(())
    }

    /// Read a fresh snapshot from `source` and make it current.
    pub fn refresh<S: SnapshotSource + ?Sized>(&self, source: &S) -> Result<(), WorkflowError> {
        self.ensure_editable()?;
        let snapshot = source.read_snapshot()?;
        self.replace_snapshot(snapshot)
    }

    // -----------------------------------------------------------------------
    // Terminal actions
    // -----------------------------------------------------------------------

    /// Continue the operation.
    ///
    /// Rejected while another action runs or while files remain conflicted.
    /// Once the backend has been called the session ends whatever the
    /// outcome, and the backend's error is returned unchanged.
    pub async fn submit(&self) -> Result<(), WorkflowError> {
        let guard = self.begin(Action::Submit)?;

        let remaining = self.conflicted_count();
        if remaining > 0 {
            return Err(WorkflowError::ConflictsRemain { count: remaining });
        }

        let (snapshot, resolutions) = self.frozen_state();
        info!(
            session = %self.id,
            operation = %self.config.operation,
            resolutions = resolutions.len(),
            "continuing operation"
        );

        let result = self
            .backend
            .continue_operation(
                &snapshot,
                &resolutions,
                &self.config.our_branch,
                self.config.their_branch.as_deref(),
            )
            .await;

        let outcome = match &result {
            Ok(()) => SessionOutcome::Continued,
            Err(e) => {
                warn!(session = %self.id, error = %e, "continue failed");
                SessionOutcome::ContinueFailed
            }
        };
        // End the session before releasing the slot so no other action can
        // claim it in between.
        self.teardown(outcome);
        drop(guard);
        result.map_err(WorkflowError::from)
    }

    /// Abort the operation. Allowed whatever the conflict state.
    pub async fn abort(&self) -> Result<(), WorkflowError> {
        let guard = self.begin(Action::Abort)?;

        let (snapshot, resolutions) = self.frozen_state();
        info!(session = %self.id, operation = %self.config.operation, "aborting operation");

        let result = self.backend.abort_operation(&snapshot, &resolutions).await;

        let outcome = match &result {
            Ok(()) => SessionOutcome::Aborted,
            Err(e) => {
                warn!(session = %self.id, error = %e, "abort failed");
                SessionOutcome::AbortFailed
            }
        };
        self.teardown(outcome);
        drop(guard);
        result.map_err(WorkflowError::from)
    }

    /// End the session without continuing or aborting.
    pub fn dismiss(&self) -> Result<(), WorkflowError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WorkflowError::ActionInProgress(self.running_action().to_string()));
        }
        self.teardown(SessionOutcome::Dismissed);
        self.busy.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Finish the session: run the progress checkpoint once, clear the
    /// registry, and tell the host. Returns `false` if already torn down.
    pub fn teardown(&self, outcome: SessionOutcome) -> bool {
        if self.ended.swap(true, Ordering::SeqCst) {
            return false;
        }

        let mut state = self.lock_state();
        let checkpoint = self.progress.checkpoint(
            self.config.already_resolved,
            &state.snapshot,
            &state.resolutions,
            || {},
        );
        state.resolutions.clear();
        drop(state);

        if checkpoint == CheckpointOutcome::Notified {
            self.host.conflicts_resolved();
        }

        let elapsed = Utc::now() - self.started_at;
        info!(
            session = %self.id,
            %outcome,
            notified = checkpoint == CheckpointOutcome::Notified,
            elapsed_ms = elapsed.num_milliseconds(),
            "conflict session ended"
        );
        self.host.session_ended(outcome);
        true
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn frozen_state(&self) -> (Arc<WorkingDirectorySnapshot>, ManualResolutions) {
        let state = self.lock_state();
        (state.snapshot.clone(), state.resolutions.clone())
    }

    fn running_action(&self) -> Action {
        if self.aborting.load(Ordering::SeqCst) {
            Action::Abort
        } else {
            Action::Submit
        }
    }

    fn ensure_editable(&self) -> Result<(), WorkflowError> {
        if self.has_ended() {
            return Err(WorkflowError::SessionEnded(self.id.to_string()));
        }
        if self.busy.load(Ordering::SeqCst) {
            return Err(WorkflowError::ActionInProgress(self.running_action().to_string()));
        }
        Ok(())
    }

    /// Claim the single action slot for `action`.
    fn begin(&self, action: Action) -> Result<ActionGuard<'_>, WorkflowError> {
        if self.has_ended() {
            return Err(WorkflowError::SessionEnded(self.id.to_string()));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(session = %self.id, %action, "rejected, another action is running");
            return Err(WorkflowError::ActionInProgress(self.running_action().to_string()));
        }
        if self.has_ended() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(WorkflowError::SessionEnded(self.id.to_string()));
        }
        let track = match action {
            Action::Submit => &self.submitting,
            Action::Abort => &self.aborting,
        };
        track.store(true, Ordering::SeqCst);
        Ok(ActionGuard {
            busy: &self.busy,
            track,
        })
    }
}

/// Clears the action flags on drop, on every exit path.
struct ActionGuard<'a> {
    busy: &'a AtomicBool,
    track: &'a AtomicBool,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.track.store(false, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use super::*;
    use crate::models::FileStatus;

    #[derive(Default)]
    struct RecordingHost {
        resolved: AtomicUsize,
        ended: Mutex<Vec<SessionOutcome>>,
    }

    impl SessionHost for RecordingHost {
        fn conflicts_resolved(&self) {
            self.resolved.fetch_add(1, Ordering::SeqCst);
        }

        fn session_ended(&self, outcome: SessionOutcome) {
            self.ended.lock().unwrap().push(outcome);
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        fail: bool,
        gate: Option<Arc<Notify>>,
        continued: AtomicUsize,
        aborted: AtomicUsize,
    }

    #[async_trait]
    impl OperationBackend for FakeBackend {
        async fn continue_operation(
            &self,
            _snapshot: &WorkingDirectorySnapshot,
            _resolutions: &ManualResolutions,
            _our_branch: &str,
            _their_branch: Option<&str>,
        ) -> Result<(), OperationError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.continued.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OperationError::CommandFailed {
                    exit_code: 1,
                    stderr: "could not continue".into(),
                });
            }
            Ok(())
        }

        async fn abort_operation(
            &self,
            _snapshot: &WorkingDirectorySnapshot,
            _resolutions: &ManualResolutions,
        ) -> Result<(), OperationError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.aborted.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OperationError::CommandFailed {
                    exit_code: 128,
                    stderr: "abort failed".into(),
                });
            }
            Ok(())
        }
    }

    fn two_conflicts() -> WorkingDirectorySnapshot {
        WorkingDirectorySnapshot::new(vec![
            FileStatus::new("one.txt", FileStatusKind::ConflictedWithMarkers { markers: 1 }),
            FileStatus::new("two.txt", FileStatusKind::AddedByThem),
            FileStatus::new("notes.md", FileStatusKind::Untracked),
        ])
        .unwrap()
    }

    fn config() -> SessionConfig {
        SessionConfig {
            operation: OperationKind::Merge,
            our_branch: "main".into(),
            their_branch: Some("feature".into()),
            already_resolved: false,
        }
    }

    fn session(
        snapshot: WorkingDirectorySnapshot,
        backend: FakeBackend,
    ) -> (ConflictSession<FakeBackend, Arc<RecordingHost>>, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        (ConflictSession::new(config(), snapshot, backend, host.clone()), host)
    }

    #[test]
    fn test_submit_control_tracks_conflicts() {
        let (session, _host) = session(two_conflicts(), FakeBackend::default());

        let control = session.submit_control();
        assert!(!control.enabled);
        assert_eq!(
            control.tooltip.as_deref(),
            Some("Resolve 2 conflicted files before continuing the merge")
        );

        session.resolve("one.txt", ManualResolution::Ours).unwrap();
        let control = session.submit_control();
        assert!(!control.enabled);
        assert_eq!(
            control.tooltip.as_deref(),
            Some("Resolve 1 conflicted file before continuing the merge")
        );

        session.resolve("two.txt", ManualResolution::Theirs).unwrap();
        let control = session.submit_control();
        assert!(control.enabled);
        assert!(control.tooltip.is_none());
    }

    #[test]
    fn test_resolve_rejects_paths_outside_operation() {
        let (session, _host) = session(two_conflicts(), FakeBackend::default());
        let err = session.resolve("notes.md", ManualResolution::Ours).unwrap_err();
        assert!(matches!(err, WorkflowError::NotUnmerged(p) if p == "notes.md"));
        let err = session.resolve("missing.txt", ManualResolution::Ours).unwrap_err();
        assert!(matches!(err, WorkflowError::NotUnmerged(_)));
    }

    #[test]
    fn test_file_views_distinguish_resolution_source() {
        let snapshot = WorkingDirectorySnapshot::new(vec![
            FileStatus::new("edited.rs", FileStatusKind::ConflictedWithoutMarkers),
            FileStatus::new("picked.rs", FileStatusKind::DeletedByUs),
            FileStatus::new("open.rs", FileStatusKind::ConflictedWithMarkers { markers: 2 }),
            FileStatus::new("plain.rs", FileStatusKind::Modified),
        ])
        .unwrap();
        let (session, _host) = session(snapshot, FakeBackend::default());
        session.resolve("picked.rs", ManualResolution::Theirs).unwrap();

        let views = session.file_views();
        let states: Vec<(&str, FileState)> =
            views.iter().map(|v| (v.path.as_str(), v.state)).collect();
        assert_eq!(
            states,
            vec![
                ("edited.rs", FileState::ResolvedByEdit),
                ("picked.rs", FileState::ResolvedManually(ManualResolution::Theirs)),
                ("open.rs", FileState::Conflicted),
            ]
        );
    }

    #[test]
    fn test_empty_snapshot_allows_submit_immediately() {
        let (session, _host) = session(WorkingDirectorySnapshot::empty(), FakeBackend::default());
        assert_eq!(session.conflicted_count(), 0);
        assert!(session.submit_control().enabled);
        assert!(session.file_views().is_empty());
    }

    #[tokio::test]
    async fn test_submit_with_conflicts_is_rejected() {
        let (session, host) = session(two_conflicts(), FakeBackend::default());
        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, WorkflowError::ConflictsRemain { count: 2 }));
        assert_eq!(session.backend().continued.load(Ordering::SeqCst), 0);
        assert!(!session.has_ended());
        assert!(host.ended.lock().unwrap().is_empty());
        assert_eq!(session.action_state().submit, ActionProgress::Idle);
    }

    #[tokio::test]
    async fn test_submit_ends_session_and_notifies_once() {
        let (session, host) = session(two_conflicts(), FakeBackend::default());
        session.resolve("one.txt", ManualResolution::Ours).unwrap();
        session.resolve("two.txt", ManualResolution::Theirs).unwrap();

        session.submit().await.unwrap();

        assert_eq!(session.backend().continued.load(Ordering::SeqCst), 1);
        assert!(session.has_ended());
        assert!(session.resolutions().is_empty());
        assert_eq!(host.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(*host.ended.lock().unwrap(), vec![SessionOutcome::Continued]);

        assert!(!session.teardown(SessionOutcome::Dismissed));
        assert_eq!(host.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(host.ended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_submit_still_ends_session() {
        let backend = FakeBackend {
            fail: true,
            ..Default::default()
        };
        let (session, host) = session(WorkingDirectorySnapshot::empty(), backend);

        let err = session.submit().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Operation(OperationError::CommandFailed { .. })));
        assert!(session.has_ended());
        assert_eq!(session.action_state().submit, ActionProgress::Idle);
        assert_eq!(*host.ended.lock().unwrap(), vec![SessionOutcome::ContinueFailed]);
        assert_eq!(host.resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_abort_allowed_with_conflicts() {
        let (session, host) = session(two_conflicts(), FakeBackend::default());
        session.abort().await.unwrap();
        assert_eq!(session.backend().aborted.load(Ordering::SeqCst), 1);
        assert_eq!(*host.ended.lock().unwrap(), vec![SessionOutcome::Aborted]);
        assert_eq!(host.resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_actions_after_end_are_rejected() {
        let (session, _host) = session(two_conflicts(), FakeBackend::default());
        session.abort().await.unwrap();

        assert!(matches!(session.abort().await, Err(WorkflowError::SessionEnded(_))));
        assert!(matches!(
            session.resolve("one.txt", ManualResolution::Ours),
            Err(WorkflowError::SessionEnded(_))
        ));
        assert!(!session.abort_enabled());
    }

    #[tokio::test]
    async fn test_abort_while_submitting_is_rejected() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let (session, host) = session(WorkingDirectorySnapshot::empty(), backend);

        let second = async {
            tokio::task::yield_now().await;
            let state = session.action_state();
            let control = session.submit_control();
            let abort_enabled = session.abort_enabled();
            let abort = session.abort().await;
            let edit = session.dismiss();
            gate.notify_one();
            (state, control, abort_enabled, abort, edit)
        };

        let (submit, (state, control, abort_enabled, abort, edit)) =
            tokio::join!(session.submit(), second);

        assert!(submit.is_ok());
        assert_eq!(state.submit, ActionProgress::InProgress);
        assert_eq!(state.abort, ActionProgress::Idle);
        assert!(!control.enabled);
        assert!(!abort_enabled);
        assert!(matches!(abort, Err(WorkflowError::ActionInProgress(a)) if a == "submit"));
        assert!(matches!(edit, Err(WorkflowError::ActionInProgress(_))));
        assert_eq!(session.backend().aborted.load(Ordering::SeqCst), 0);
        assert_eq!(*host.ended.lock().unwrap(), vec![SessionOutcome::Continued]);
    }

    /// Observes the session from inside its own `session_ended` callback.
    #[derive(Default)]
    struct ObservingHost {
        session: std::sync::OnceLock<std::sync::Weak<ObservedSession>>,
        seen: Mutex<Vec<(bool, bool, ActionState)>>,
    }

    type ObservedSession = ConflictSession<FakeBackend, Arc<ObservingHost>>;

    impl SessionHost for ObservingHost {
        fn conflicts_resolved(&self) {}

        fn session_ended(&self, _outcome: SessionOutcome) {
            if let Some(session) = self.session.get().and_then(std::sync::Weak::upgrade) {
                self.seen.lock().unwrap().push((
                    session.abort_enabled(),
                    session.submit_control().enabled,
                    session.action_state(),
                ));
            }
        }
    }

    #[tokio::test]
    async fn test_action_slot_held_until_session_ended() {
        let host = Arc::new(ObservingHost::default());
        let session = Arc::new(ConflictSession::new(
            config(),
            WorkingDirectorySnapshot::empty(),
            FakeBackend::default(),
            host.clone(),
        ));
        host.session.set(Arc::downgrade(&session)).unwrap();

        session.submit().await.unwrap();

        let seen = host.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        let (abort_enabled, submit_enabled, state) = seen[0];
        assert!(!abort_enabled);
        assert!(!submit_enabled);
        assert_eq!(state.submit, ActionProgress::InProgress);

        // Released once the call returns, but the session stays ended.
        assert_eq!(session.action_state().submit, ActionProgress::Idle);
        assert!(matches!(session.abort().await, Err(WorkflowError::SessionEnded(_))));
        assert_eq!(session.backend().aborted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dismiss_runs_checkpoint() {
        let (session, host) = session(two_conflicts(), FakeBackend::default());
        session.resolve("two.txt", ManualResolution::Ours).unwrap();
        session.dismiss().unwrap();
        assert_eq!(host.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(*host.ended.lock().unwrap(), vec![SessionOutcome::Dismissed]);
    }

    #[test]
    fn test_already_resolved_host_is_not_notified_again() {
        let host = Arc::new(RecordingHost::default());
        let config = SessionConfig {
            already_resolved: true,
            ..config()
        };
        let session =
            ConflictSession::new(config, two_conflicts(), FakeBackend::default(), host.clone());
        session.resolve("one.txt", ManualResolution::Ours).unwrap();
        session.dismiss().unwrap();
        assert_eq!(host.resolved.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_refresh_replaces_snapshot() {
        struct Fixed(WorkingDirectorySnapshot);
        impl SnapshotSource for Fixed {
            fn read_snapshot(&self) -> Result<WorkingDirectorySnapshot, SnapshotError> {
                Ok(self.0.clone())
            }
        }

        let (session, _host) = session(two_conflicts(), FakeBackend::default());
        session.resolve("one.txt", ManualResolution::Ours).unwrap();
        session
            .refresh(&Fixed(
                WorkingDirectorySnapshot::new(vec![FileStatus::new(
                    "two.txt",
                    FileStatusKind::AddedByThem,
                )])
                .unwrap(),
            ))
            .unwrap();

        assert_eq!(session.snapshot().len(), 1);
        // The stale entry for one.txt stays in the registry but is inert.
        assert!(session.resolutions().contains("one.txt"));
        assert_eq!(session.conflicted_count(), 1);
    }
}

use crate::config::ToolConfig;
use crate::patch::{PatchApplier, PatchError, PatchPlanner, PendingPatch, PlanOutcome};
use crate::progress::{CancelToken, Event};
use crate::replace::{ReplaceJob, ReplacePipeline};
use crate::scan::ScanPipeline;
use crate::store::{Slot, StoreError, VersionStore};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("an operation is already in progress; cancel it or wait for it to finish")]
    BatchInProgress,

    #[error("no pending patch; run a plan first")]
    NoPendingPatch,

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coordinator for one user session.
///
/// Owns the state that must never live in ambient globals: the single pending
/// patch slot, the cancellation token, and the handle of the one background
/// batch task that may be active at a time. Starting a new batch while one
/// is running is rejected, never queued.
pub struct Session {
    config: ToolConfig,
    store: VersionStore,
    cancel: CancelToken,
    pending: Option<PendingPatch>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: ToolConfig) -> Result<Self, SessionError> {
        let store = config.build_store()?;
        Ok(Self {
            config,
            store,
            cancel: CancelToken::new(),
            pending: None,
            worker: None,
        })
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    fn ensure_idle(&mut self) -> Result<(), SessionError> {
        if let Some(handle) = &self.worker {
            if !handle.is_finished() {
                return Err(SessionError::BatchInProgress);
            }
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Start a background scan of `root`. Events arrive on the returned
    /// receiver; the terminal event is [`Event::ScanFinished`].
    pub fn start_scan(&mut self, root: PathBuf) -> Result<Receiver<Event>, SessionError> {
        self.ensure_idle()?;
        self.cancel.reset();

        let (tx, rx) = mpsc::channel();
        let pipeline = ScanPipeline::new(self.config.file_suffix.clone(), self.cancel.clone());
        self.worker = Some(std::thread::spawn(move || pipeline.run(&root, &tx)));
        Ok(rx)
    }

    /// Start a background replace batch over `files`, in the given order.
    /// The terminal event is [`Event::ReplaceFinished`].
    pub fn start_replace(
        &mut self,
        files: Vec<PathBuf>,
        job: ReplaceJob,
    ) -> Result<Receiver<Event>, SessionError> {
        self.ensure_idle()?;
        self.cancel.reset();

        let (tx, rx) = mpsc::channel();
        let pipeline = ReplacePipeline::new(
            job,
            self.config.build_formatter(),
            self.store.clone(),
            self.cancel.clone(),
        );
        self.worker = Some(std::thread::spawn(move || pipeline.run(&files, &tx)));
        Ok(rx)
    }

    /// Request cooperative cancellation of the active batch, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the active batch has fully stopped.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Plan a snippet patch against `target`. Any previously pending patch
    /// is discarded first; a `Ready` outcome arms the pending slot.
    pub fn plan(&mut self, snippet: &str, target: &Path) -> Result<PlanOutcome, SessionError> {
        self.pending = None;

        let formatter = self.config.build_formatter();
        let mut planner = PatchPlanner::new(formatter.as_ref(), self.config.diff_context)?;
        let outcome = planner.plan(snippet, target)?;

        if let PlanOutcome::Ready { patch, .. } = &outcome {
            self.pending = Some(patch.clone());
        }
        Ok(outcome)
    }

    pub fn has_pending_patch(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply the pending patch. The slot is cleared unconditionally,
    /// success or failure: a failed apply must be re-planned, never retried
    /// with stale state.
    pub fn apply_pending(&mut self) -> Result<PendingPatch, SessionError> {
        let patch = self.pending.take().ok_or(SessionError::NoPendingPatch)?;
        PatchApplier::new(&self.store).apply(&patch)?;
        Ok(patch)
    }

    pub fn undo(&self, file: &Path) -> Result<(), SessionError> {
        self.store.undo(file)?;
        Ok(())
    }

    pub fn redo(&self, file: &Path) -> Result<(), SessionError> {
        self.store.redo(file)?;
        Ok(())
    }

    pub fn restore(&self, file: &Path, slot: Slot) -> Result<(), SessionError> {
        self.store.restore(file, slot)?;
        Ok(())
    }

    #[cfg(test)]
    fn set_worker_for_test(&mut self, handle: JoinHandle<()>) {
        self.worker = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchError;
    use std::fs;

    fn test_session(dir: &Path) -> Session {
        let config = ToolConfig {
            backup_root: Some(dir.join("central")),
            formatter: crate::config::FormatterConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        Session::new(config).unwrap()
    }

    #[test]
    fn second_batch_is_rejected_while_one_is_active() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(dir.path());

        // Park a fake worker on a channel so the busy state is
        // deterministic.
        let (hold_tx, hold_rx) = mpsc::channel::<()>();
        session.set_worker_for_test(std::thread::spawn(move || {
            let _ = hold_rx.recv();
        }));

        let result = session.start_scan(dir.path().to_path_buf());
        assert!(matches!(result, Err(SessionError::BatchInProgress)));

        hold_tx.send(()).unwrap();
        session.wait();
        assert!(session.start_scan(dir.path().to_path_buf()).is_ok());
        session.wait();
    }

    #[test]
    fn plan_arms_and_apply_clears_pending_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(dir.path());

        let target = dir.path().join("t.py");
        fs::write(&target, "def f():\n    return 1\n").unwrap();

        let outcome = session.plan("def f():\n    return 2\n", &target).unwrap();
        assert!(matches!(outcome, PlanOutcome::Ready { .. }));
        assert!(session.has_pending_patch());

        session.apply_pending().unwrap();
        assert!(!session.has_pending_patch());
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "def f():\n    return 2\n"
        );

        // A second apply without a new plan is refused.
        assert!(matches!(
            session.apply_pending(),
            Err(SessionError::NoPendingPatch)
        ));
    }

    #[test]
    fn failed_apply_still_clears_pending_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(dir.path());

        let target = dir.path().join("t.py");
        fs::write(
            &target,
            "a = 1\nb = 2\nc = 3\ndef f():\n    return 1\n",
        )
        .unwrap();

        session.plan("def f():\n    return 2\n", &target).unwrap();
        fs::write(&target, "x = 0\n").unwrap();

        let err = session.apply_pending().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Patch(PatchError::StaleIndices { .. })
        ));
        assert!(!session.has_pending_patch());
    }

    #[test]
    fn new_plan_discards_previous_pending_patch() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(dir.path());

        let target = dir.path().join("t.py");
        fs::write(&target, "def f():\n    return 1\n").unwrap();

        session.plan("def f():\n    return 2\n", &target).unwrap();
        assert!(session.has_pending_patch());

        // No-change outcome leaves the slot empty rather than keeping the
        // stale patch around.
        let outcome = session.plan("def f():\n    return 1\n", &target).unwrap();
        assert!(matches!(outcome, PlanOutcome::NoChange { .. }));
        assert!(!session.has_pending_patch());
    }

    #[test]
    fn undo_redo_pass_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = test_session(dir.path());

        let target = dir.path().join("t.py");
        fs::write(&target, "def f():\n    return 1\n").unwrap();

        session.plan("def f():\n    return 2\n", &target).unwrap();
        session.apply_pending().unwrap();

        session.undo(&target).unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "def f():\n    return 1\n"
        );
        session.redo(&target).unwrap();
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "def f():\n    return 2\n"
        );
    }
}

//! End-to-end workflow tests
//!
//! Drives the full library surface the way the CLI does:
//! 1. Scan a tree for Python files
//! 2. Run a replace batch over the scan results
//! 3. Undo and redo through the central store
//! 4. Plan and apply a snippet patch

use snippatch::config::{FormatterConfig, ToolConfig};
use snippatch::progress::Event;
use snippatch::replace::ReplaceJob;
use snippatch::session::Session;
use snippatch::{BatchSummary, PlanOutcome, Severity};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Project tree with a couple of Python files and one decoy.
fn setup_workspace() -> (TempDir, Session) {
    let dir = TempDir::new().unwrap();

    fs::create_dir_all(dir.path().join("proj/pkg")).unwrap();
    fs::write(dir.path().join("proj/a.py"), "x=1\n").unwrap();
    fs::write(dir.path().join("proj/pkg/b.py"), "value = 'x=1'\n").unwrap();
    fs::write(dir.path().join("proj/notes.txt"), "x=1\n").unwrap();

    let config = ToolConfig {
        backup_root: Some(dir.path().join("central")),
        formatter: FormatterConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let session = Session::new(config).unwrap();
    (dir, session)
}

fn drain_scan(rx: std::sync::mpsc::Receiver<Event>) -> (Vec<PathBuf>, bool) {
    for event in rx {
        if let Event::ScanFinished { files, cancelled } = event {
            return (files, cancelled);
        }
    }
    panic!("scan terminated without a finished event");
}

fn drain_replace(rx: std::sync::mpsc::Receiver<Event>) -> (Vec<(String, Severity)>, BatchSummary) {
    let mut records = Vec::new();
    for event in rx {
        match event {
            Event::Progress(rec) => records.push((rec.message, rec.severity)),
            Event::ReplaceFinished(summary) => return (records, summary),
            Event::ScanFinished { .. } => panic!("unexpected scan event"),
        }
    }
    panic!("replace terminated without a summary");
}

#[test]
fn scan_then_replace_then_undo_redo() {
    let (dir, mut session) = setup_workspace();

    // Scan picks up only the .py files.
    let rx = session.start_scan(dir.path().join("proj")).unwrap();
    let (files, cancelled) = drain_scan(rx);
    session.wait();
    assert!(!cancelled);
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.to_string_lossy().ends_with(".py")));

    let job = ReplaceJob {
        pattern: "x=1".to_string(),
        replacement: "y=1".to_string(),
        use_regex: false,
        diff_context: 1,
    };
    let rx = session.start_replace(files.clone(), job).unwrap();
    let (records, summary) = drain_replace(rx);
    session.wait();

    assert_eq!(summary.updated, 2);
    assert_eq!(summary.errors, 0);
    assert!(!summary.cancelled);
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|(msg, sev)| msg.contains("[Updated]") && *sev == Severity::Success));

    let a = dir.path().join("proj/a.py");
    assert_eq!(fs::read_to_string(&a).unwrap(), "y=1\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("proj/pkg/b.py")).unwrap(),
        "value = 'y=1'\n"
    );
    // Untracked file left alone.
    assert_eq!(
        fs::read_to_string(dir.path().join("proj/notes.txt")).unwrap(),
        "x=1\n"
    );

    // The redo slot in the central store holds the pre-write content.
    let slots = session.store().slot_paths(&a).unwrap();
    assert_eq!(fs::read_to_string(&slots.redo).unwrap(), "x=1\n");

    // Undo brings back the original; redo re-applies the change.
    session.undo(&a).unwrap();
    assert_eq!(fs::read_to_string(&a).unwrap(), "x=1\n");
    session.redo(&a).unwrap();
    assert_eq!(fs::read_to_string(&a).unwrap(), "y=1\n");
}

#[test]
fn replace_batch_is_rejected_while_scan_runs() {
    let (dir, mut session) = setup_workspace();

    let rx = session.start_scan(dir.path().join("proj")).unwrap();
    let (files, _) = drain_scan(rx);
    session.wait();

    // Once the worker is joined a new batch starts cleanly.
    let rx = session
        .start_replace(files, ReplaceJob::format_only(1))
        .unwrap();
    let (_, summary) = drain_replace(rx);
    session.wait();
    assert_eq!(summary.unchanged, 2);
}

#[test]
fn plan_apply_patch_and_undo() {
    let (dir, mut session) = setup_workspace();

    let target = dir.path().join("proj/mod.py");
    let original = "\
import os


def helper():
    return 1


def main():
    print(helper())
";
    fs::write(&target, original).unwrap();

    let snippet = "def helper():\n    return 2\n";
    let outcome = session.plan(snippet, &target).unwrap();
    let diff = match outcome {
        PlanOutcome::Ready { ref diff, ref patch } => {
            assert_eq!(patch.target_name, "helper");
            diff.clone()
        }
        PlanOutcome::NoChange { .. } => panic!("expected a ready patch"),
    };
    assert!(diff.contains("-    return 1"));
    assert!(diff.contains("+    return 2"));

    // Planning does not touch the target.
    assert_eq!(fs::read_to_string(&target).unwrap(), original);

    session.apply_pending().unwrap();
    let patched = fs::read_to_string(&target).unwrap();
    assert!(patched.contains("return 2"));
    assert!(!patched.contains("return 1"));
    // Surrounding code untouched.
    assert!(patched.contains("import os"));
    assert!(patched.contains("def main():"));

    session.undo(&target).unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), original);
}

#[test]
fn patch_against_unknown_definition_fails_cleanly() {
    let (dir, mut session) = setup_workspace();

    let target = dir.path().join("proj/t.py");
    fs::write(&target, "def other():\n    pass\n").unwrap();

    let err = session
        .plan("def helper():\n    return 2\n", &target)
        .unwrap_err();
    assert!(err.to_string().contains("helper"));
    assert!(!session.has_pending_patch());
    // Target untouched on failure.
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "def other():\n    pass\n"
    );
}

#[test]
fn format_only_run_reports_no_changes() {
    let (dir, mut session) = setup_workspace();

    let rx = session.start_scan(dir.path().join("proj")).unwrap();
    let (files, _) = drain_scan(rx);
    session.wait();

    let rx = session
        .start_replace(files, ReplaceJob::format_only(1))
        .unwrap();
    let (records, summary) = drain_replace(rx);
    session.wait();

    assert_eq!(summary.updated, 0);
    assert_eq!(summary.unchanged, 2);
    assert!(records
        .iter()
        .all(|(msg, sev)| msg.contains("[No change]") && *sev == Severity::Info));
    // No snapshots taken for untouched files.
    let slots = session
        .store()
        .slot_paths(&dir.path().join("proj/a.py"))
        .unwrap();
    assert!(!slots.redo.exists());
}

#[test]
fn cancel_token_resets_between_batches() {
    let (dir, mut session) = setup_workspace();

    let mut files = Vec::new();
    for i in 0..4 {
        let f = dir.path().join(format!("proj/f{i}.py"));
        fs::write(&f, "x=1\n").unwrap();
        files.push(f);
    }

    // A cancel left over from a previous batch must not poison the next
    // one: starting a batch resets the token.
    session.cancel();
    let job = ReplaceJob {
        pattern: "x=1".to_string(),
        replacement: "y=1".to_string(),
        use_regex: false,
        diff_context: 1,
    };
    let rx = session.start_replace(files.clone(), job).unwrap();
    let (_, summary) = drain_replace(rx);
    session.wait();

    assert!(!summary.cancelled);
    assert_eq!(summary.updated, 4);
    for f in &files {
        assert_eq!(fs::read_to_string(f).unwrap(), "y=1\n");
    }
}

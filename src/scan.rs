use crate::progress::{emit, CancelToken, Event, ProgressRecord, Severity};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use walkdir::WalkDir;

/// Cooperatively cancellable recursive file enumeration.
///
/// Walks `root` for files whose name ends with `suffix`, in directory
/// order, checking the cancellation flag once per discovered entry. The
/// terminal [`Event::ScanFinished`] always fires, carrying whatever was
/// accumulated: a cancelled scan yields its partial list, not nothing.
pub struct ScanPipeline {
    suffix: String,
    cancel: CancelToken,
}

impl ScanPipeline {
    pub fn new(suffix: impl Into<String>, cancel: CancelToken) -> Self {
        Self {
            suffix: suffix.into(),
            cancel,
        }
    }

    /// Run the scan, streaming events into `tx`. Blocking; intended to run
    /// on a worker thread.
    pub fn run(&self, root: &Path, tx: &Sender<Event>) {
        if !root.is_dir() {
            emit(
                tx,
                Event::Progress(ProgressRecord::new(
                    0,
                    format!("selected path is not a directory: {}", root.display()),
                    Severity::Error,
                )),
            );
            emit(
                tx,
                Event::ScanFinished {
                    files: Vec::new(),
                    cancelled: false,
                },
            );
            return;
        }

        let mut files: Vec<PathBuf> = Vec::new();
        let mut cancelled = false;

        for entry in WalkDir::new(root) {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    // Permission failure at the root aborts the walk;
                    // anything deeper is a soft skip.
                    let at_root = err.path() == Some(root);
                    emit(
                        tx,
                        Event::Progress(ProgressRecord::new(
                            0,
                            format!("cannot read {}: {err}", describe_path(err.path(), root)),
                            if at_root {
                                Severity::Error
                            } else {
                                Severity::Warning
                            },
                        )),
                    );
                    if at_root {
                        break;
                    }
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(&self.suffix) {
                continue;
            }

            // Unreadable files are skipped here so the replace pass never
            // starts on a file it cannot read.
            if std::fs::File::open(entry.path()).is_err() {
                emit(
                    tx,
                    Event::Progress(ProgressRecord::new(
                        0,
                        format!("skipping unreadable file: {}", entry.path().display()),
                        Severity::Warning,
                    )),
                );
                continue;
            }

            files.push(entry.path().to_path_buf());
        }

        emit(tx, Event::ScanFinished { files, cancelled });
    }
}

fn describe_path(path: Option<&Path>, root: &Path) -> String {
    path.unwrap_or(root).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;

    fn collect_result(rx: mpsc::Receiver<Event>) -> (Vec<PathBuf>, bool) {
        for event in rx {
            if let Event::ScanFinished { files, cancelled } = event {
                return (files, cancelled);
            }
        }
        panic!("scan never finished");
    }

    #[test]
    fn scan_finds_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        fs::write(dir.path().join("a.py"), "").unwrap();
        fs::write(dir.path().join("pkg/b.py"), "").unwrap();
        fs::write(dir.path().join("pkg/sub/c.py"), "").unwrap();
        fs::write(dir.path().join("pkg/readme.md"), "").unwrap();

        let (tx, rx) = mpsc::channel();
        ScanPipeline::new(".py", CancelToken::new()).run(dir.path(), &tx);
        drop(tx);

        let (files, cancelled) = collect_result(rx);
        assert!(!cancelled);
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.extension().unwrap() == "py"));
    }

    #[test]
    fn scan_of_non_directory_emits_error_and_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir.py");
        fs::write(&file, "").unwrap();

        let (tx, rx) = mpsc::channel();
        ScanPipeline::new(".py", CancelToken::new()).run(&file, &tx);
        drop(tx);

        let events: Vec<Event> = rx.into_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Progress(ProgressRecord {
                severity: Severity::Error,
                ..
            })
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ScanFinished { files, cancelled: false } if files.is_empty()
        )));
    }

    #[test]
    fn cancelled_scan_emits_partial_result() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("f{i}.py")), "").unwrap();
        }

        let cancel = CancelToken::new();
        cancel.cancel(); // Cancel before the first entry check.

        let (tx, rx) = mpsc::channel();
        ScanPipeline::new(".py", cancel).run(dir.path(), &tx);
        drop(tx);

        let (files, cancelled) = collect_result(rx);
        assert!(cancelled);
        assert!(files.is_empty());
    }
}

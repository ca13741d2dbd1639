use crate::format::Formatter;
use crate::fsio;
use crate::progress::{emit, BatchSummary, CancelToken, Event, ProgressRecord, Severity};
use crate::store::VersionStore;
use similar::TextDiff;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("invalid regex pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// Parameters for one batch replace run.
#[derive(Debug, Clone)]
pub struct ReplaceJob {
    /// Search pattern. Empty means format-only: substitution is skipped.
    pub pattern: String,
    pub replacement: String,
    pub use_regex: bool,
    /// Context lines in the per-file diff summaries.
    pub diff_context: usize,
}

impl ReplaceJob {
    pub fn format_only(diff_context: usize) -> Self {
        Self {
            pattern: String::new(),
            replacement: String::new(),
            use_regex: false,
            diff_context,
        }
    }
}

/// Per-file batch processor: read, optional find/replace, reformat,
/// change-detect, snapshot, write, report.
///
/// Files are processed strictly in list order. Cancellation is checked once
/// at the top of each file; a file that started processing always completes
/// its read/replace/format/write sequence, so nothing is ever left
/// half-written.
pub struct ReplacePipeline {
    job: ReplaceJob,
    formatter: Box<dyn Formatter>,
    store: VersionStore,
    cancel: CancelToken,
}

impl ReplacePipeline {
    pub fn new(
        job: ReplaceJob,
        formatter: Box<dyn Formatter>,
        store: VersionStore,
        cancel: CancelToken,
    ) -> Self {
        Self {
            job,
            formatter,
            store,
            cancel,
        }
    }

    /// Process `files`, streaming one progress record per file plus a
    /// terminal [`Event::ReplaceFinished`]. Blocking; intended to run on a
    /// worker thread.
    pub fn run(&self, files: &[PathBuf], tx: &Sender<Event>) {
        let total = files.len();
        let mut summary = BatchSummary::default();
        let mut processed = 0usize;

        for file in files {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                emit(
                    tx,
                    Event::Progress(ProgressRecord::new(
                        crate::progress::percent_done(processed, total),
                        "[Cancelled] stopped before processing remaining files",
                        Severity::Warning,
                    )),
                );
                break;
            }

            let record = self.process_file(file, &mut summary);
            processed += 1;
            emit(
                tx,
                Event::Progress(ProgressRecord::new(
                    crate::progress::percent_done(processed, total),
                    record.message,
                    record.severity,
                )),
            );
        }

        emit(tx, Event::ReplaceFinished(summary));
    }

    fn process_file(&self, file: &Path, summary: &mut BatchSummary) -> FileRecord {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        // 1. Read. Failure skips the file entirely; it still counts toward
        // progress.
        let original = match fsio::read_text(file) {
            Ok(text) => text,
            Err(err) => {
                summary.errors += 1;
                return FileRecord::error(format!("[Read Error] {name}: {err}"));
            }
        };

        // 2. Optional find/replace. A bad pattern degrades to "content
        // unmodified" and processing continues with the original text.
        let mut replace_error: Option<String> = None;
        let replaced = if self.job.pattern.is_empty() {
            original.clone()
        } else {
            match apply_replacement(
                &original,
                &self.job.pattern,
                &self.job.replacement,
                self.job.use_regex,
            ) {
                Ok(text) => text,
                Err(err) => {
                    replace_error = Some(err.to_string());
                    original.clone()
                }
            }
        };

        // 3. Reformat. Failure is a warning; the pre-format content is what
        // gets saved so the formatter can never block a replacement.
        let mut format_warning: Option<String> = None;
        let finalized = match self.formatter.format(&replaced) {
            Ok(text) => text,
            Err(err) => {
                format_warning = Some(err.to_string());
                replaced
            }
        };

        // 4. Change detection by exact equality: unchanged files get no
        // snapshot and no write.
        if original == finalized {
            summary.unchanged += 1;
            return match &replace_error {
                Some(err) => {
                    summary.errors += 1;
                    FileRecord::error(format!(
                        "[Replace Error] {name}: {err} (no change written)"
                    ))
                }
                None => FileRecord {
                    message: format!("[No change] {name}"),
                    severity: Severity::Info,
                },
            };
        }

        let diff = unified_summary(&original, &finalized, &name, self.job.diff_context);

        // 5. Snapshot before the write; a failed snapshot aborts this file
        // with nothing written.
        if let Err(err) = self.store.snapshot(file) {
            summary.errors += 1;
            return FileRecord::error(format!("[Backup Error] {name}: {err}"));
        }

        if let Err(err) = fsio::write_text(file, &finalized) {
            summary.errors += 1;
            return FileRecord::error(format!("[Write Error] {name}: {err}"));
        }

        summary.updated += 1;

        // Replace errors outrank format warnings in the displayed status.
        let (status, severity) = match (&replace_error, &format_warning) {
            (Some(err), _) => {
                summary.warnings += 1;
                (
                    format!("[Updated with Replace Error] {name}: {err}"),
                    Severity::Warning,
                )
            }
            (None, Some(warn)) => {
                summary.warnings += 1;
                (
                    format!("[Updated with Format Warning] {name}: {warn}"),
                    Severity::Warning,
                )
            }
            (None, None) => (format!("[Updated] {name}"), Severity::Success),
        };

        FileRecord {
            message: format!("{status}\n{diff}"),
            severity,
        }
    }
}

struct FileRecord {
    message: String,
    severity: Severity,
}

impl FileRecord {
    fn error(message: String) -> Self {
        Self {
            message,
            severity: Severity::Error,
        }
    }
}

/// Literal or regex substitution over the whole content.
pub fn apply_replacement(
    content: &str,
    pattern: &str,
    replacement: &str,
    use_regex: bool,
) -> Result<String, ReplaceError> {
    if use_regex {
        let re = regex::Regex::new(pattern)?;
        Ok(re.replace_all(content, replacement).into_owned())
    } else {
        Ok(content.replace(pattern, replacement))
    }
}

/// Unified-diff summary for the progress log.
pub fn unified_summary(original: &str, modified: &str, name: &str, context: usize) -> String {
    let diff = TextDiff::from_lines(original, modified);
    diff.unified_diff()
        .context_radius(context)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

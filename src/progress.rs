use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Severity of a single progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One streamed progress record: emitted once per processed file, or once
/// for a terminal cancellation notice. Not retained by the core.
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    /// Running completion percentage, 0-100, rounded down.
    pub percent: u8,
    pub message: String,
    pub severity: Severity,
}

impl ProgressRecord {
    pub fn new(percent: u8, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            percent,
            message: message.into(),
            severity,
        }
    }
}

/// Aggregate counts reported when a replace batch finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub warnings: usize,
    pub errors: usize,
    pub cancelled: bool,
}

/// Events streamed from a background pipeline to the coordinator.
#[derive(Debug, Clone)]
pub enum Event {
    Progress(ProgressRecord),
    /// Terminal scan result: discovery-ordered file list plus whether the
    /// scan was cut short by cancellation. A cancelled scan still carries
    /// everything discovered before the flag was observed.
    ScanFinished {
        files: Vec<PathBuf>,
        cancelled: bool,
    },
    /// Terminal replace result, distinct from per-file progress.
    ReplaceFinished(BatchSummary),
}

/// Cooperative cancellation flag shared between the coordinator and a
/// worker. Checked at well-defined points by the running task itself; never
/// forces termination mid-file.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Reset before reuse by a new batch.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Send an event, ignoring a disconnected receiver: a consumer that went
/// away must not bring the worker down.
pub fn emit(tx: &Sender<Event>, event: Event) {
    let _ = tx.send(event);
}

/// Integer percentage, rounded down.
pub fn percent_done(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_down() {
        assert_eq!(percent_done(1, 3), 33);
        assert_eq!(percent_done(2, 3), 66);
        assert_eq!(percent_done(3, 3), 100);
        assert_eq!(percent_done(0, 0), 100);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }
}

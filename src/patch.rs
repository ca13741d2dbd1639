use crate::ast::{AstError, DefKind, SnippetLocator};
use crate::format::{preclean, Formatter, FormatterError};
use crate::fsio::{self, FsError, LINE_ENDING};
use crate::replace::unified_summary;
use crate::store::{StoreError, VersionStore};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("snippet could not be formatted: {0}")]
    Formatter(#[from] FormatterError),

    #[error("snippet is not valid Python: {0}")]
    SnippetSyntax(#[source] AstError),

    #[error("no function or class definition found in the snippet")]
    NoDefinitionInSnippet,

    #[error("cannot locate `{name}` in {path}; the file has a syntax error: {source}")]
    TargetSyntax {
        name: String,
        path: PathBuf,
        #[source]
        source: AstError,
    },

    #[error("{kind} `{name}` not found in {path}")]
    TargetNotFound {
        kind: DefKind,
        name: String,
        path: PathBuf,
    },

    #[error(
        "located span {start}..{end} for `{name}` is inconsistent with {path} ({line_count} lines)"
    )]
    SpanOutOfBounds {
        name: String,
        path: PathBuf,
        start: usize,
        end: usize,
        line_count: usize,
    },

    #[error(
        "stored line span {start}..{end} is invalid for the current state of {path} ({line_count} lines); the file changed since planning"
    )]
    StaleIndices {
        path: PathBuf,
        start: usize,
        end: usize,
        line_count: usize,
    },

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parser(AstError),
}

/// A reviewed, not-yet-applied replacement of a line range in a target
/// file. Produced by [`PatchPlanner::plan`]; consumed exactly once by
/// [`PatchApplier::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a PendingPatch does nothing until applied"]
pub struct PendingPatch {
    pub file: PathBuf,
    /// 0-based inclusive start of the replaced range.
    pub start_line: usize,
    /// 0-based exclusive end of the replaced range.
    pub end_line: usize,
    pub replacement_lines: Vec<String>,
    pub target_name: String,
    pub target_kind: DefKind,
}

/// Outcome of planning: either a reviewable patch with its rendered block
/// diff, or the informational "snippet is identical" case, which is not an
/// error and produces nothing to apply.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Ready { patch: PendingPatch, diff: String },
    NoChange { name: String, kind: DefKind },
}

/// Turns a pasted snippet plus a target file into a [`PendingPatch`]
/// without mutating anything on disk.
pub struct PatchPlanner<'f> {
    formatter: &'f dyn Formatter,
    locator: SnippetLocator,
    diff_context: usize,
}

impl<'f> PatchPlanner<'f> {
    pub fn new(formatter: &'f dyn Formatter, diff_context: usize) -> Result<Self, PatchError> {
        Ok(Self {
            formatter,
            locator: SnippetLocator::new().map_err(PatchError::Parser)?,
            diff_context,
        })
    }

    pub fn plan(&mut self, snippet: &str, target: &Path) -> Result<PlanOutcome, PatchError> {
        // A snippet that cannot be formatted cannot be safely located or
        // applied, so formatter failure aborts planning here (unlike the
        // batch pipeline, where it only degrades).
        let cleaned = preclean(snippet);
        let formatted = self.formatter.format(&cleaned)?;

        let snippet_def = self
            .locator
            .first_definition(&formatted)
            .map_err(PatchError::SnippetSyntax)?
            .ok_or(PatchError::NoDefinitionInSnippet)?;

        let target_text = fsio::read_text(target)?;
        let target_def = self
            .locator
            .find_definition(&target_text, &snippet_def.name)
            .map_err(|source| PatchError::TargetSyntax {
                name: snippet_def.name.clone(),
                path: target.to_path_buf(),
                source,
            })?
            .ok_or_else(|| PatchError::TargetNotFound {
                kind: snippet_def.kind,
                name: snippet_def.name.clone(),
                path: target.to_path_buf(),
            })?;

        let target_lines: Vec<&str> = target_text.lines().collect();
        if target_def.end_line <= target_def.start_line
            || target_def.end_line > target_lines.len()
        {
            return Err(PatchError::SpanOutOfBounds {
                name: target_def.name,
                path: target.to_path_buf(),
                start: target_def.start_line,
                end: target_def.end_line,
                line_count: target_lines.len(),
            });
        }

        let existing_block = &target_lines[target_def.start_line..target_def.end_line];
        let replacement_lines: Vec<String> =
            formatted.lines().map(|l| l.to_string()).collect();

        let identical = existing_block
            .iter()
            .copied()
            .eq(replacement_lines.iter().map(String::as_str));
        if identical {
            return Ok(PlanOutcome::NoChange {
                name: target_def.name,
                kind: target_def.kind,
            });
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.display().to_string());
        let diff = unified_summary(
            &format!("{}\n", existing_block.join("\n")),
            &format!("{}\n", replacement_lines.join("\n")),
            &format!("{file_name} ({})", target_def.name),
            self.diff_context,
        );

        Ok(PlanOutcome::Ready {
            patch: PendingPatch {
                file: target.to_path_buf(),
                start_line: target_def.start_line,
                end_line: target_def.end_line,
                replacement_lines,
                target_name: target_def.name,
                target_kind: target_def.kind,
            },
            diff,
        })
    }
}

/// Commits a [`PendingPatch`] to disk.
pub struct PatchApplier<'s> {
    store: &'s VersionStore,
}

impl<'s> PatchApplier<'s> {
    pub fn new(store: &'s VersionStore) -> Self {
        Self { store }
    }

    /// Apply the patch: snapshot, re-read, re-validate the span against the
    /// file's current state, splice, write.
    ///
    /// The snapshot must succeed before anything is mutated. The target is
    /// re-read rather than trusting the planner's earlier read because
    /// arbitrary time may have passed; a span that no longer fits fails
    /// with [`PatchError::StaleIndices`] and writes nothing, and the caller
    /// must re-plan. If the write itself fails, the snapshot already taken
    /// still allows an undo to the pre-patch state.
    pub fn apply(&self, patch: &PendingPatch) -> Result<(), PatchError> {
        self.store.snapshot(&patch.file)?;

        // Raw split preserving each line's own ending characters.
        let current = fsio::read_text(&patch.file)?;
        let raw_lines: Vec<&str> = current.split_inclusive('\n').collect();

        if patch.start_line > patch.end_line || patch.end_line > raw_lines.len() {
            return Err(PatchError::StaleIndices {
                path: patch.file.clone(),
                start: patch.start_line,
                end: patch.end_line,
                line_count: raw_lines.len(),
            });
        }

        let mut result = String::with_capacity(current.len());
        for line in &raw_lines[..patch.start_line] {
            result.push_str(line);
        }
        for line in &patch.replacement_lines {
            result.push_str(line);
            result.push_str(LINE_ENDING);
        }
        for line in &raw_lines[patch.end_line..] {
            result.push_str(line);
        }

        fsio::write_text(&patch.file, &result)?;
        Ok(())
    }
}

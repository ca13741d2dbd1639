//! Snippatch: AST-aware snippet patching and bulk find/replace for Python
//! source trees.
//!
//! # Architecture
//!
//! Three subsystems carry the engineering weight:
//!
//! - [`store::VersionStore`]: a central `.bak`/`.redo` snapshot pair per
//!   tracked file, mirrored outside the project tree, making every
//!   destructive write reversible without an in-memory undo stack.
//! - The patch engine ([`patch::PatchPlanner`] / [`patch::PatchApplier`]):
//!   locates a named function or class in a target file by structural
//!   position via tree-sitter and replaces exactly that line range, with
//!   bounds re-validated at apply time.
//! - The batch pipelines ([`scan::ScanPipeline`] / [`replace::ReplacePipeline`]):
//!   cooperatively cancellable scan and find/replace/reformat passes that
//!   stream per-file progress and never leave a file half-written.
//!
//! # Safety
//!
//! - Every destructive write is preceded by a snapshot; snapshot failure
//!   aborts before any mutation
//! - Atomic file writes (tempfile + fsync + rename)
//! - Patch spans are re-validated against the file's current state at
//!   apply time
//! - Cancellation is cooperative and checked only between files
//!
//! # Example
//!
//! ```no_run
//! use snippatch::config::ToolConfig;
//! use snippatch::session::Session;
//! use std::path::Path;
//!
//! let mut session = Session::new(ToolConfig::default())?;
//! session.plan("def f():\n    return 2\n", Path::new("app.py"))?;
//! if session.has_pending_patch() {
//!     session.apply_pending()?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ast;
pub mod config;
pub mod format;
pub mod fsio;
pub mod patch;
pub mod progress;
pub mod replace;
pub mod scan;
pub mod session;
pub mod store;

// Re-exports
pub use ast::{AstError, DefKind, Definition, SnippetLocator};
pub use config::{load_from_path, load_from_str, ConfigError, ToolConfig};
pub use format::{CommandFormatter, Formatter, FormatterError, IdentityFormatter};
pub use patch::{PatchApplier, PatchError, PatchPlanner, PendingPatch, PlanOutcome};
pub use progress::{BatchSummary, CancelToken, Event, ProgressRecord, Severity};
pub use replace::{ReplaceJob, ReplacePipeline};
pub use scan::ScanPipeline;
pub use session::{Session, SessionError};
pub use store::{Slot, StoreError, VersionStore};

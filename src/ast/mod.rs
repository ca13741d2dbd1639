//! Python parsing stack: tree-sitter wrapper and structural locator.

pub mod errors;
pub mod locator;
pub mod parser;

pub use errors::AstError;
pub use locator::{DefKind, Definition, SnippetLocator};
pub use parser::{ParsedSource, PythonParser};

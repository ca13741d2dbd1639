use crate::ast::errors::AstError;
use crate::ast::parser::PythonParser;
use tree_sitter::Node;

/// Kind of a located definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Function,
    Class,
}

impl std::fmt::Display for DefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefKind::Function => write!(f, "function"),
            DefKind::Class => write!(f, "class"),
        }
    }
}

/// A located function or class definition.
///
/// Line indices are 0-based and half-open: `[start_line, end_line)` against
/// the lines of the text that produced them. Callers must re-validate the
/// span against the file's current line count before using it to mutate
/// anything; the file may have changed since location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub kind: DefKind,
    pub start_line: usize,
    pub end_line: usize,
}

/// Locates function/class definitions in Python source by structural
/// position.
pub struct SnippetLocator {
    parser: PythonParser,
}

impl SnippetLocator {
    pub fn new() -> Result<Self, AstError> {
        Ok(Self {
            parser: PythonParser::new()?,
        })
    }

    /// Validate that `source` parses cleanly, without searching for
    /// anything.
    pub fn check_syntax(&mut self, source: &str) -> Result<(), AstError> {
        let parsed = self.parser.parse_with_source(source)?;
        parsed.check_syntax()
    }

    /// Find the first definition named `name` in document order.
    ///
    /// `Ok(None)` is the normal "not found" outcome, not an error. A parse
    /// failure in `source` is an error: a span located in broken source
    /// cannot be trusted.
    pub fn find_definition(
        &mut self,
        source: &str,
        name: &str,
    ) -> Result<Option<Definition>, AstError> {
        let parsed = self.parser.parse_with_source(source)?;
        parsed.check_syntax()?;
        Ok(first_match(parsed.root_node(), source, Some(name)))
    }

    /// Find the first definition of any name, used to identify what a
    /// pasted snippet defines.
    pub fn first_definition(&mut self, source: &str) -> Result<Option<Definition>, AstError> {
        let parsed = self.parser.parse_with_source(source)?;
        parsed.check_syntax()?;
        Ok(first_match(parsed.root_node(), source, None))
    }
}

/// Depth-first, left-to-right traversal returning the first matching
/// definition. Recursion stops at a matched node (its body is never
/// entered), but nested definitions remain reachable as long as nothing
/// has matched yet.
fn first_match(node: Node<'_>, source: &str, name: Option<&str>) -> Option<Definition> {
    if let Some(def) = as_definition(node, source) {
        match name {
            None => return Some(def),
            Some(wanted) if def.name == wanted => return Some(def),
            Some(_) => {}
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(def) = first_match(child, source, name) {
            return Some(def);
        }
    }

    None
}

fn as_definition(node: Node<'_>, source: &str) -> Option<Definition> {
    // Async functions are plain function_definition nodes in the Python
    // grammar, with an `async` keyword child.
    let kind = match node.kind() {
        "function_definition" => DefKind::Function,
        "class_definition" => DefKind::Class,
        _ => return None,
    };

    let name_node = node.child_by_field_name("name")?;
    let name = source[name_node.byte_range()].to_string();

    Some(Definition {
        name,
        kind,
        start_line: node.start_position().row,
        end_line: node.end_position().row + 1,
    })
}

use crate::ast::errors::AstError;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser wrapper for Python source code.
///
/// The grammar comes from ast-grep-language's bundled tree-sitter grammars.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, AstError> {
        let mut parser = Parser::new();
        let ts_lang = SupportLang::Python.get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| AstError::LanguageSet)?;
        Ok(Self { parser })
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, AstError> {
        self.parser
            .parse(source, None)
            .ok_or(AstError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, AstError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new().expect("failed to create default PythonParser")
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.first_error().is_some()
    }

    /// Find the first ERROR/MISSING node in document order, if any.
    pub fn first_error(&self) -> Option<ErrorNode> {
        first_error_node(self.root_node())
    }

    /// Promote a detected parse error into an [`AstError::Syntax`], or
    /// `Ok(())` if the tree is clean.
    pub fn check_syntax(&self) -> Result<(), AstError> {
        match self.first_error() {
            Some(err) => Err(AstError::Syntax {
                line: err.line + 1,
                message: err.message,
            }),
            None => Ok(()),
        }
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }
}

/// Information about the first ERROR node in a parse tree.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    /// 0-based line of the error.
    pub line: usize,
    pub message: String,
}

fn first_error_node(node: tree_sitter::Node<'_>) -> Option<ErrorNode> {
    if node.is_error() || node.is_missing() {
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            "invalid syntax".to_string()
        };
        return Some(ErrorNode {
            line: node.start_position().row,
            message,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = first_error_node(child) {
            return Some(err);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_python() {
        let mut parser = PythonParser::new().unwrap();
        let source = "def main():\n    print(\"hello\")\n";
        let parsed = parser.parse_with_source(source).unwrap();

        assert!(!parsed.has_errors());
        assert_eq!(parsed.root_node().kind(), "module");
    }

    #[test]
    fn parse_invalid_python() {
        let mut parser = PythonParser::new().unwrap();
        let source = "def main(:\n    pass\n";
        let parsed = parser.parse_with_source(source).unwrap();

        assert!(parsed.has_errors());
        assert!(matches!(
            parsed.check_syntax(),
            Err(AstError::Syntax { .. })
        ));
    }
}

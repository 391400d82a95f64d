//! Tree-sitter front end: source text to a concrete syntax tree.

use crate::traits::ReadError;
use tree_sitter::{Node, Parser, Tree};

/// A successfully parsed Python source file.
pub struct SyntaxTree<'a> {
    source: &'a str,
    tree: Tree,
}

impl<'a> SyntaxTree<'a> {
    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Parse Python source, failing on the first grammar violation.
pub fn parse_python(source: &str) -> Result<SyntaxTree<'_>, ReadError> {
    let mut parser = Parser::new();
    parser
        .set_language(&arborium_python::language().into())
        .map_err(|err| ReadError::Parse(err.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ReadError::Parse("failed to parse".into()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(root, source));
    }

    Ok(SyntaxTree { source, tree })
}

fn syntax_error(root: Node, source: &str) -> ReadError {
    let Some(node) = first_error(root) else {
        return ReadError::Syntax {
            line: 1,
            column: 1,
            message: "invalid syntax".into(),
        };
    };

    let position = node.start_position();
    let message = if node.is_missing() {
        format!("expected '{}'", node.kind())
    } else {
        let text = node.utf8_text(source.as_bytes()).unwrap_or("");
        match text.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => format!("invalid syntax near '{}'", line),
            _ => "invalid syntax".to_string(),
        }
    };

    ReadError::Syntax {
        line: position.row + 1,
        column: position.column + 1,
        message,
    }
}

/// Depth-first search for the earliest ERROR or MISSING node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() {
        let tree = parse_python("x = 1\n").unwrap();
        assert_eq!(tree.root().kind(), "module");
        assert_eq!(tree.source(), "x = 1\n");
    }

    #[test]
    fn test_empty_source() {
        let tree = parse_python("").unwrap();
        assert_eq!(tree.root().named_child_count(), 0);
    }

    #[test]
    fn test_syntax_error_has_position() {
        let err = parse_python("def (:\n").err().expect("syntax error");
        match err {
            ReadError::Syntax { line, column, .. } => {
                assert_eq!(line, 1);
                assert!(column >= 1);
            }
            other => panic!("expected Syntax, got {other:?}"),
        }
    }
}

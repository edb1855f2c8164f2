//! Node types for the marker-aware source tree.
//!
//! Four node kinds exist: plain undecorated lines, decorated marker lines,
//! escaped blocks whose interior is opaque verbatim text, and nested blocks
//! whose interior is recursively parsed. Node identity is by tree position;
//! positions are addressed with index paths (see [`NodePath`]) rather than
//! parent references, and the transform layer splices child lists through
//! those paths.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lines::{is_blank, is_valid_line_terminator, modify_text_to_be_absent, Line};
use crate::markers::is_marker_suitable;

/// Path of child indices leading from the root to a child list.
///
/// The empty path addresses the root's own child list; each further index
/// selects a nested block child whose child list is addressed next. Only
/// nested blocks contribute levels, since escaped blocks hold raw lines.
pub type NodePath = Vec<usize>;

/// A single physical line with no recognized marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndecoratedLine {
    pub text: String,
    pub line_sep: String,
}

/// A single physical line whose content, after its indent, matched a
/// registered marker. The remainder of the line after the marker is its
/// "aftermath".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedLine {
    pub indent: String,
    pub marker: String,
    pub marker_aftermath: String,
    pub line_sep: String,
}

/// A verbatim span bounded by a start and an end marker line sharing the
/// same aftermath. The shared aftermath acts as the block's tag, which is
/// how consecutive or nested blocks using the same marker pair find their
/// own closing line. Children are never re-parsed for markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapedBlock {
    pub indent: String,
    pub marker: String,
    pub marker_aftermath: String,
    pub line_sep: String,
    pub end_indent: String,
    pub end_marker: String,
    pub end_line_sep: String,
    pub children: Vec<UndecoratedLine>,
}

/// A span bounded by distinct start and end markers whose interior is
/// recursively parsed, supporting arbitrary nesting depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedBlock {
    pub indent: String,
    pub marker: String,
    pub marker_aftermath: String,
    pub line_sep: String,
    pub end_indent: String,
    pub end_marker: String,
    pub end_marker_aftermath: String,
    pub end_line_sep: String,
    pub children: Vec<AstNode>,
}

/// The tagged union of source tree nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AstNode {
    UndecoratedLine(UndecoratedLine),
    DecoratedLine(DecoratedLine),
    EscapedBlock(EscapedBlock),
    NestedBlock(NestedBlock),
}

/// Root of a parsed source file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceAst {
    pub children: Vec<AstNode>,
}

/// Errors raised when synthesizing nodes outside a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    UnsuitableMarker(String),
    NonBlankIndent(String),
    InvalidLineTerminator(String),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::UnsuitableMarker(m) => write!(f, "unsuitable marker: {:?}", m),
            NodeError::NonBlankIndent(i) => write!(f, "non-blank indent: {:?}", i),
            NodeError::InvalidLineTerminator(s) => {
                write!(f, "invalid line terminator: {:?}", s)
            }
        }
    }
}

impl std::error::Error for NodeError {}

fn validate_marker(marker: &str) -> Result<(), NodeError> {
    if !is_marker_suitable(marker) {
        return Err(NodeError::UnsuitableMarker(marker.to_string()));
    }
    Ok(())
}

fn validate_indent(indent: &str) -> Result<(), NodeError> {
    if !is_blank(indent) {
        return Err(NodeError::NonBlankIndent(indent.to_string()));
    }
    Ok(())
}

fn validate_line_sep(line_sep: &str) -> Result<(), NodeError> {
    if !is_valid_line_terminator(line_sep) {
        return Err(NodeError::InvalidLineTerminator(line_sep.to_string()));
    }
    Ok(())
}

impl DecoratedLine {
    /// Synthesizes a decorated line carrying `content` as its aftermath,
    /// validating marker suitability, indent blankness and the terminator.
    pub fn create(
        content: &str,
        indent: &str,
        marker: &str,
        line_sep: &str,
    ) -> Result<DecoratedLine, NodeError> {
        validate_marker(marker)?;
        validate_indent(indent)?;
        validate_line_sep(line_sep)?;
        Ok(DecoratedLine {
            indent: indent.to_string(),
            marker: marker.to_string(),
            marker_aftermath: content.to_string(),
            line_sep: line_sep.to_string(),
        })
    }
}

/// Attributes for synthesizing an escaped block. `marker_aftermath` is the
/// requested block tag; the constructor may lengthen it to keep it absent
/// from the block's content.
#[derive(Debug, Clone, Default)]
pub struct EscapedBlockAttrs {
    pub marker_aftermath: String,
    pub indent: String,
    pub marker: String,
    pub line_sep: String,
    pub end_indent: String,
    pub end_marker: String,
    pub end_line_sep: String,
}

impl EscapedBlock {
    /// Synthesizes an escaped block holding `lines` verbatim.
    ///
    /// The aftermath is rewritten with `-1`, `-2`, ... suffixes until no
    /// content line contains the end marker followed by the aftermath, so
    /// that reparsing the rendered block can never close early on one of
    /// its own content lines.
    pub fn create(lines: &[Line], attrs: EscapedBlockAttrs) -> Result<EscapedBlock, NodeError> {
        validate_marker(&attrs.marker)?;
        validate_marker(&attrs.end_marker)?;
        validate_indent(&attrs.indent)?;
        validate_indent(&attrs.end_indent)?;
        validate_line_sep(&attrs.line_sep)?;
        validate_line_sep(&attrs.end_line_sep)?;

        let texts: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
        let tagged = format!("{}{}", attrs.end_marker, attrs.marker_aftermath);
        let unique = modify_text_to_be_absent(&texts, &tagged);
        let marker_aftermath = unique[attrs.end_marker.len()..].to_string();

        let children = lines
            .iter()
            .map(|l| UndecoratedLine {
                text: l.text.clone(),
                line_sep: l.terminator.clone(),
            })
            .collect();
        Ok(EscapedBlock {
            indent: attrs.indent,
            marker: attrs.marker,
            marker_aftermath,
            line_sep: attrs.line_sep,
            end_indent: attrs.end_indent,
            end_marker: attrs.end_marker,
            end_line_sep: attrs.end_line_sep,
            children,
        })
    }
}

impl AstNode {
    /// Number of physical lines the node spans.
    pub fn line_count(&self) -> usize {
        match self {
            AstNode::UndecoratedLine(_) | AstNode::DecoratedLine(_) => 1,
            AstNode::EscapedBlock(n) => 2 + n.children.len(),
            AstNode::NestedBlock(n) => {
                2 + n.children.iter().map(AstNode::line_count).sum::<usize>()
            }
        }
    }
}

impl SourceAst {
    /// Resolves a path to the child list it addresses.
    pub fn child_list(&self, path: &[usize]) -> Option<&Vec<AstNode>> {
        let mut current = &self.children;
        for &idx in path {
            match current.get(idx)? {
                AstNode::NestedBlock(n) => current = &n.children,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Mutable variant of [`SourceAst::child_list`].
    pub fn child_list_mut(&mut self, path: &[usize]) -> Option<&mut Vec<AstNode>> {
        let mut current = &mut self.children;
        for &idx in path {
            match current.get_mut(idx)? {
                AstNode::NestedBlock(n) => current = &mut n.children,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Resolves a node by its parent path and index within that parent.
    pub fn node_at(&self, parent_path: &[usize], idx: usize) -> Option<&AstNode> {
        self.child_list(parent_path)?.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_decorated_line() {
        let n = DecoratedLine::create("xor", "  ", "deo", "\r\n").unwrap();
        assert_eq!(
            n,
            DecoratedLine {
                indent: "  ".into(),
                marker: "deo".into(),
                marker_aftermath: "xor".into(),
                line_sep: "\r\n".into(),
            }
        );
    }

    #[test]
    fn test_create_decorated_line_rejects_bad_attrs() {
        assert_eq!(
            DecoratedLine::create("", "u", "ode", "\n"),
            Err(NodeError::NonBlankIndent("u".into()))
        );
        assert_eq!(
            DecoratedLine::create("xor", "  ", "de\no", "\r\n"),
            Err(NodeError::UnsuitableMarker("de\no".into()))
        );
        assert_eq!(
            DecoratedLine::create("", "", "e", "xxxxx"),
            Err(NodeError::InvalidLineTerminator("xxxxx".into()))
        );
    }

    #[test]
    fn test_create_escaped_block() {
        let lines = vec![Line::new("c", "\r\n")];
        let attrs = EscapedBlockAttrs {
            marker_aftermath: "".into(),
            indent: "   ".into(),
            marker: "ab".into(),
            line_sep: "\n".into(),
            end_indent: "  ".into(),
            end_marker: "de".into(),
            end_line_sep: "\n".into(),
        };
        let n = EscapedBlock::create(&lines, attrs).unwrap();
        assert_eq!(n.marker_aftermath, "");
        assert_eq!(
            n.children,
            vec![UndecoratedLine {
                text: "c".into(),
                line_sep: "\r\n".into()
            }]
        );
    }

    #[test]
    fn test_create_escaped_block_uniquifies_aftermath() {
        let lines = vec![
            Line::new("no", "\n"),
            Line::new("yes", "\n"),
            Line::new("e:tea cup", "\r\n"),
            Line::new("\tsunshine", ""),
        ];
        let attrs = EscapedBlockAttrs {
            marker_aftermath: "tea".into(),
            indent: " ".into(),
            marker: "s:".into(),
            line_sep: "\r".into(),
            end_indent: "  ".into(),
            end_marker: "e:".into(),
            end_line_sep: "\r\n".into(),
        };
        let n = EscapedBlock::create(&lines, attrs).unwrap();
        assert_eq!(n.marker_aftermath, "tea-1");
        assert_eq!(n.children.len(), 4);
    }

    #[test]
    fn test_create_escaped_block_rejects_bad_attrs() {
        let attrs = EscapedBlockAttrs {
            marker: "d".into(),
            line_sep: "\n".into(),
            end_indent: "u".into(),
            end_marker: "ode".into(),
            end_line_sep: "\n".into(),
            ..Default::default()
        };
        assert_eq!(
            EscapedBlock::create(&[], attrs),
            Err(NodeError::NonBlankIndent("u".into()))
        );
    }

    #[test]
    fn test_line_count() {
        let block = AstNode::NestedBlock(NestedBlock {
            indent: "".into(),
            marker: "b<".into(),
            marker_aftermath: "".into(),
            line_sep: "\n".into(),
            end_indent: "".into(),
            end_marker: "b>".into(),
            end_marker_aftermath: "".into(),
            end_line_sep: "\n".into(),
            children: vec![AstNode::UndecoratedLine(UndecoratedLine {
                text: "x".into(),
                line_sep: "\n".into(),
            })],
        });
        assert_eq!(block.line_count(), 3);
    }

    #[test]
    fn test_child_list_paths() {
        let inner = AstNode::UndecoratedLine(UndecoratedLine {
            text: "x".into(),
            line_sep: "\n".into(),
        });
        let ast = SourceAst {
            children: vec![AstNode::NestedBlock(NestedBlock {
                indent: "".into(),
                marker: "b<".into(),
                marker_aftermath: "".into(),
                line_sep: "\n".into(),
                end_indent: "".into(),
                end_marker: "b>".into(),
                end_marker_aftermath: "".into(),
                end_line_sep: "\n".into(),
                children: vec![inner.clone()],
            })],
        };
        assert_eq!(ast.child_list(&[]).unwrap().len(), 1);
        assert_eq!(ast.child_list(&[0]).unwrap().len(), 1);
        assert_eq!(ast.node_at(&[0], 0), Some(&inner));
        assert!(ast.child_list(&[1]).is_none());
        assert!(ast.child_list(&[0, 0]).is_none());
    }
}

//! Serialization of trees back to text.
//!
//! This is the structural inverse of the builder: for every valid input,
//! `stringify(&builder.parse(text)?) == text`, including every terminator
//! byte. The round-trip identity is the foundational correctness property
//! of the whole engine.

use super::nodes::{AstNode, DecoratedLine, EscapedBlock, NestedBlock, SourceAst, UndecoratedLine};

/// Renders a whole tree.
pub fn stringify(ast: &SourceAst) -> String {
    let mut out = String::new();
    for child in &ast.children {
        format_any(child, &mut out);
    }
    out
}

/// Renders a single node.
pub fn stringify_node(node: &AstNode) -> String {
    let mut out = String::new();
    format_any(node, &mut out);
    out
}

/// Renders a slice of sibling nodes in order.
pub fn stringify_nodes(nodes: &[AstNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        format_any(node, &mut out);
    }
    out
}

fn format_any(node: &AstNode, out: &mut String) {
    match node {
        AstNode::UndecoratedLine(n) => format_undecorated_line(n, out),
        AstNode::DecoratedLine(n) => format_decorated_line(n, out),
        AstNode::EscapedBlock(n) => format_escaped_block(n, out),
        AstNode::NestedBlock(n) => format_nested_block(n, out),
    }
}

fn format_undecorated_line(n: &UndecoratedLine, out: &mut String) {
    out.push_str(&n.text);
    out.push_str(&n.line_sep);
}

fn format_decorated_line(n: &DecoratedLine, out: &mut String) {
    out.push_str(&n.indent);
    out.push_str(&n.marker);
    out.push_str(&n.marker_aftermath);
    out.push_str(&n.line_sep);
}

fn format_escaped_block(n: &EscapedBlock, out: &mut String) {
    out.push_str(&n.indent);
    out.push_str(&n.marker);
    out.push_str(&n.marker_aftermath);
    out.push_str(&n.line_sep);
    for child in &n.children {
        format_undecorated_line(child, out);
    }
    out.push_str(&n.end_indent);
    out.push_str(&n.end_marker);
    // The end line repeats the start aftermath; that repetition is the tag
    // the parser matched on, so the end node stores no aftermath of its own.
    out.push_str(&n.marker_aftermath);
    out.push_str(&n.end_line_sep);
}

fn format_nested_block(n: &NestedBlock, out: &mut String) {
    out.push_str(&n.indent);
    out.push_str(&n.marker);
    out.push_str(&n.marker_aftermath);
    out.push_str(&n.line_sep);
    for child in &n.children {
        format_any(child, out);
    }
    out.push_str(&n.end_indent);
    out.push_str(&n.end_marker);
    out.push_str(&n.end_marker_aftermath);
    out.push_str(&n.end_line_sep);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stringify_undecorated() {
        let ast = SourceAst {
            children: vec![AstNode::UndecoratedLine(UndecoratedLine {
                text: "abc".into(),
                line_sep: "\r\n".into(),
            })],
        };
        assert_eq!(stringify(&ast), "abc\r\n");
    }

    #[test]
    fn test_stringify_decorated() {
        let node = AstNode::DecoratedLine(DecoratedLine {
            indent: "  ".into(),
            marker: "//:".into(),
            marker_aftermath: "x".into(),
            line_sep: "\n".into(),
        });
        assert_eq!(stringify_node(&node), "  //:x\n");
    }

    #[test]
    fn test_stringify_escaped_block_repeats_start_aftermath() {
        let node = AstNode::EscapedBlock(EscapedBlock {
            indent: "".into(),
            marker: "g:".into(),
            marker_aftermath: "tag".into(),
            line_sep: "\n".into(),
            end_indent: " ".into(),
            end_marker: "k:".into(),
            end_line_sep: "\n".into(),
            children: vec![UndecoratedLine {
                text: "raw".into(),
                line_sep: "\n".into(),
            }],
        });
        assert_eq!(stringify_node(&node), "g:tag\nraw\n k:tag\n");
    }

    #[test]
    fn test_stringify_nested_block() {
        let node = AstNode::NestedBlock(NestedBlock {
            indent: "".into(),
            marker: "b<".into(),
            marker_aftermath: "s".into(),
            line_sep: "\n".into(),
            end_indent: "".into(),
            end_marker: "b>".into(),
            end_marker_aftermath: "e".into(),
            end_line_sep: "\n".into(),
            children: vec![AstNode::UndecoratedLine(UndecoratedLine {
                text: "mid".into(),
                line_sep: "\n".into(),
            })],
        });
        assert_eq!(stringify_node(&node), "b<s\nmid\nb>e\n");
    }
}

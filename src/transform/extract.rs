//! Discovery of augmenting-code regions and their arguments.
//!
//! An augmenting-code region starts at a decorated line or nested block
//! whose marker belongs to the configured augmenting-code set. Decorated
//! lines immediately following the lead node whose markers belong to the
//! argument sets are collected as arguments; everything else in the region
//! is ordinary source content. Nested-block regions additionally carry
//! "end arguments" gathered after their closing line, and may recursively
//! contain further regions.

use serde::Serialize;
use serde_json::Value;

use crate::ast::{AstNode, NodePath, SourceAst};

use super::{AstTransformer, TransformError};

/// One augmenting-code invocation site.
///
/// All indices are positions in the child list addressed by `parent_path`
/// at extraction time; they are kept current across edits by
/// [`shift_aug_codes`](super::shift_aug_codes).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugCode {
    pub parent_path: NodePath,
    pub idx_in_parent: usize,
    pub nested_block_used: bool,
    /// 1-based line number of the lead marker line.
    pub line_number: usize,
    pub marker_aftermath: String,
    /// Consolidated argument values; plain text fragments become strings,
    /// JSON fragments become parsed values.
    pub args: Vec<Value>,
    /// Exclusive end index of the argument run in the list holding it
    /// (the nested block's children for nested regions, else the region's
    /// own parent list).
    pub args_excl_end_idx: usize,
    pub end_marker_aftermath: Option<String>,
    pub end_args: Vec<Value>,
    pub end_args_excl_end_idx: Option<usize>,
    /// Regions nested inside this region's block.
    pub children: Vec<AugCode>,
}

/// Position of one generated-code slot (a decorated line or escaped block
/// carrying a generated-code marker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenCodeSection {
    pub parent_path: NodePath,
    pub idx_in_parent: usize,
    /// True when the slot is an escaped block rather than a single
    /// decorated line.
    pub escaped_block_used: bool,
}

enum ArgFragment {
    Separator,
    Piece {
        content: String,
        line_sep: String,
        json: bool,
        line_number: usize,
    },
}

impl AstTransformer {
    /// Extracts all augmenting-code descriptors from a tree, in source
    /// order. `first_line_number` is the 1-based number of the tree's
    /// first line (normally 1).
    pub fn extract_aug_codes(
        &self,
        ast: &SourceAst,
        first_line_number: usize,
    ) -> Result<Vec<AugCode>, TransformError> {
        let mut dest = Vec::new();
        let mut consumed = first_line_number.saturating_sub(1);
        let mut path = Vec::new();
        self.add_aug_codes(&ast.children, &mut path, &mut consumed, &mut dest)?;
        Ok(dest)
    }

    fn add_aug_codes(
        &self,
        children: &[AstNode],
        path: &mut NodePath,
        consumed: &mut usize,
        dest: &mut Vec<AugCode>,
    ) -> Result<(), TransformError> {
        for (i, n) in children.iter().enumerate() {
            match n {
                AstNode::NestedBlock(block) => {
                    if !self.aug_code_markers.contains(&block.marker) {
                        *consumed += n.line_count();
                        continue;
                    }
                    *consumed += 1;
                    let start_line = *consumed;
                    let (args, args_excl_end_idx) =
                        self.extract_args(&block.children, 0, start_line + 1)?;
                    let (end_args, end_args_excl_end_idx) =
                        self.extract_args(children, i + 1, start_line + n.line_count())?;
                    let mut aug_code = AugCode {
                        parent_path: path.clone(),
                        idx_in_parent: i,
                        nested_block_used: true,
                        line_number: start_line,
                        marker_aftermath: block.marker_aftermath.clone(),
                        args,
                        args_excl_end_idx,
                        end_marker_aftermath: Some(block.end_marker_aftermath.clone()),
                        end_args,
                        end_args_excl_end_idx: Some(end_args_excl_end_idx),
                        children: Vec::new(),
                    };
                    path.push(i);
                    self.add_aug_codes(&block.children, path, consumed, &mut aug_code.children)?;
                    path.pop();
                    *consumed += 1;
                    dest.push(aug_code);
                }
                AstNode::DecoratedLine(line) => {
                    *consumed += 1;
                    if !self.aug_code_markers.contains(&line.marker) {
                        continue;
                    }
                    let (args, args_excl_end_idx) =
                        self.extract_args(children, i + 1, *consumed + 1)?;
                    dest.push(AugCode {
                        parent_path: path.clone(),
                        idx_in_parent: i,
                        nested_block_used: false,
                        line_number: *consumed,
                        marker_aftermath: line.marker_aftermath.clone(),
                        args,
                        args_excl_end_idx,
                        end_marker_aftermath: None,
                        end_args: Vec::new(),
                        end_args_excl_end_idx: None,
                        children: Vec::new(),
                    });
                }
                _ => *consumed += n.line_count(),
            }
        }
        Ok(())
    }

    /// Collects the run of argument lines starting at `start_index`,
    /// returning the consolidated values and the exclusive end index of
    /// the run.
    fn extract_args(
        &self,
        children: &[AstNode],
        start_index: usize,
        first_line_number: usize,
    ) -> Result<(Vec<Value>, usize), TransformError> {
        let mut fragments = Vec::new();
        let mut i = start_index;
        let mut line_number = first_line_number;
        while i < children.len() {
            let line = match &children[i] {
                AstNode::DecoratedLine(line) => line,
                _ => break,
            };
            if self.aug_code_arg_sep_markers.contains(&line.marker) {
                fragments.push(ArgFragment::Separator);
            } else if self.aug_code_json_arg_markers.contains(&line.marker) {
                fragments.push(ArgFragment::Piece {
                    content: line.marker_aftermath.clone(),
                    line_sep: line.line_sep.clone(),
                    json: true,
                    line_number,
                });
            } else if self.aug_code_arg_markers.contains(&line.marker) {
                fragments.push(ArgFragment::Piece {
                    content: line.marker_aftermath.clone(),
                    line_sep: line.line_sep.clone(),
                    json: false,
                    line_number,
                });
            } else {
                break;
            }
            i += 1;
            line_number += 1;
        }
        Ok((consolidate_args(&fragments)?, i))
    }

    /// Finds the generated-code slots belonging to a region: for a nested
    /// region, the slots inside its block (minus those claimed as "last
    /// slot" by child regions) followed by the region's own last slot at
    /// the parent level, if any.
    pub fn extract_gen_code_sections(
        &self,
        ast: &SourceAst,
        aug_code: &AugCode,
    ) -> Vec<GenCodeSection> {
        let mut sections = Vec::new();
        if aug_code.nested_block_used {
            self.add_nested_gen_code_sections(ast, aug_code, &mut sections);
        }
        if let Some(last) = self.last_gen_code_section(ast, aug_code) {
            sections.push(last);
        }
        sections
    }

    fn add_nested_gen_code_sections(
        &self,
        ast: &SourceAst,
        aug_code: &AugCode,
        dest: &mut Vec<GenCodeSection>,
    ) {
        // Slots acting as the last slot of a child region belong to that
        // child, not to this region.
        let exemptions: Vec<usize> = aug_code
            .children
            .iter()
            .filter_map(|child| {
                self.last_gen_code_section(ast, child)
                    .map(|g| g.idx_in_parent)
            })
            .collect();
        let mut block_path = aug_code.parent_path.clone();
        block_path.push(aug_code.idx_in_parent);
        let block_children = match ast.child_list(&block_path) {
            Some(children) => children,
            None => return,
        };
        for (i, n) in block_children.iter().enumerate() {
            if exemptions.contains(&i) {
                continue;
            }
            let (marker, escaped_block_used) = match n {
                AstNode::DecoratedLine(line) => (&line.marker, false),
                AstNode::EscapedBlock(block) => (&block.marker, true),
                _ => continue,
            };
            if self.gen_code_markers.contains(marker) {
                dest.push(GenCodeSection {
                    parent_path: block_path.clone(),
                    idx_in_parent: i,
                    escaped_block_used,
                });
            }
        }
    }

    /// Finds the first generated-code slot after a region's arguments and
    /// before the next augmenting-code or argument marker at the same
    /// level.
    fn last_gen_code_section(&self, ast: &SourceAst, aug_code: &AugCode) -> Option<GenCodeSection> {
        let start_idx = if aug_code.nested_block_used {
            aug_code.end_args_excl_end_idx?
        } else {
            aug_code.args_excl_end_idx
        };
        let nodes = ast.child_list(&aug_code.parent_path)?;
        for (i, n) in nodes.iter().enumerate().skip(start_idx) {
            match n {
                AstNode::DecoratedLine(line) => {
                    if self.aug_code_markers.contains(&line.marker) {
                        break;
                    }
                    if self.aug_code_json_arg_markers.contains(&line.marker)
                        || self.aug_code_arg_markers.contains(&line.marker)
                        || self.aug_code_arg_sep_markers.contains(&line.marker)
                    {
                        break;
                    }
                    if self.gen_code_markers.contains(&line.marker) {
                        return Some(GenCodeSection {
                            parent_path: aug_code.parent_path.clone(),
                            idx_in_parent: i,
                            escaped_block_used: false,
                        });
                    }
                }
                AstNode::NestedBlock(block) => {
                    if self.aug_code_markers.contains(&block.marker) {
                        break;
                    }
                }
                AstNode::EscapedBlock(block) => {
                    if self.gen_code_markers.contains(&block.marker) {
                        return Some(GenCodeSection {
                            parent_path: aug_code.parent_path.clone(),
                            idx_in_parent: i,
                            escaped_block_used: true,
                        });
                    }
                }
                AstNode::UndecoratedLine(_) => {}
            }
        }
        None
    }
}

/// Consolidates the raw argument fragments of one run: adjacent fragments
/// of the same kind are joined with the terminator that originally
/// separated them, separator fragments split runs, and JSON runs are
/// parsed into values.
fn consolidate_args(fragments: &[ArgFragment]) -> Result<Vec<Value>, TransformError> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < fragments.len() {
        if matches!(fragments[i], ArgFragment::Separator) {
            i += 1;
            continue;
        }
        let mut builder = String::new();
        let mut block_is_json = false;
        let mut block_line_number = 0;
        let mut prev_sep: &str = "";
        let mut first = true;
        while i < fragments.len() {
            let (content, line_sep, json, line_number) = match &fragments[i] {
                ArgFragment::Piece {
                    content,
                    line_sep,
                    json,
                    line_number,
                } => (content, line_sep, *json, *line_number),
                ArgFragment::Separator => break,
            };
            if first {
                block_is_json = json;
                block_line_number = line_number;
            } else {
                if block_is_json != json {
                    break;
                }
                builder.push_str(prev_sep);
            }
            builder.push_str(content);
            prev_sep = line_sep;
            first = false;
            i += 1;
        }
        if block_is_json {
            match serde_json::from_str(&builder) {
                Ok(value) => blocks.push(value),
                Err(e) => {
                    return Err(TransformError::InvalidJsonArg {
                        line_number: block_line_number,
                        message: e.to_string(),
                    });
                }
            }
        } else {
            blocks.push(Value::String(builder));
        }
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::markers::MarkerSet;
    use serde_json::json;

    fn markers(list: &[&str]) -> MarkerSet {
        MarkerSet::compile(&list.iter().map(|m| m.to_string()).collect::<Vec<_>>())
    }

    fn builder() -> AstBuilder {
        AstBuilder {
            decorated_line_markers: markers(&["//:", "//_json:", "//|", "//."]),
            escaped_block_start_markers: markers(&["/*<"]),
            escaped_block_end_markers: markers(&[">*/"]),
            nested_block_start_markers: markers(&["//aug<"]),
            nested_block_end_markers: markers(&["//aug>"]),
        }
    }

    fn transformer() -> AstTransformer {
        AstTransformer {
            aug_code_markers: markers(&["//aug<", "//."]),
            aug_code_arg_markers: markers(&["//:"]),
            aug_code_json_arg_markers: markers(&["//_json:"]),
            aug_code_arg_sep_markers: markers(&["//|"]),
            gen_code_markers: markers(&["/*<"]),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_simple_aug_code_with_args() {
        let src = "before\n//.generate\n//:first\n//:second\nafter\n";
        let ast = builder().parse(src, "").unwrap();
        let aug_codes = transformer().extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(aug_codes.len(), 1);
        let aug = &aug_codes[0];
        assert!(!aug.nested_block_used);
        assert_eq!(aug.parent_path, Vec::<usize>::new());
        assert_eq!(aug.idx_in_parent, 1);
        assert_eq!(aug.line_number, 2);
        assert_eq!(aug.marker_aftermath, "generate");
        assert_eq!(aug.args, vec![json!("first\nsecond")]);
        assert_eq!(aug.args_excl_end_idx, 4);
    }

    #[test]
    fn test_arg_separator_splits_values() {
        let src = "//.x\n//:a\n//|\n//:b\n";
        let ast = builder().parse(src, "").unwrap();
        let aug_codes = transformer().extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(aug_codes[0].args, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_json_arg_breaks_text_run() {
        let src = "//.x\n//:a\n//_json:{\"n\": 1}\n//:b\n";
        let ast = builder().parse(src, "").unwrap();
        let aug_codes = transformer().extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(
            aug_codes[0].args,
            vec![json!("a"), json!({"n": 1}), json!("b")]
        );
    }

    #[test]
    fn test_multi_line_json_arg() {
        let src = "//.x\n//_json:{\"n\":\n//_json: 2}\n";
        let ast = builder().parse(src, "").unwrap();
        let aug_codes = transformer().extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(aug_codes[0].args, vec![json!({"n": 2})]);
    }

    #[test]
    fn test_malformed_json_arg_is_fatal() {
        let src = "//.x\n//_json:{oops\n";
        let ast = builder().parse(src, "").unwrap();
        let err = transformer().extract_aug_codes(&ast, 1).unwrap_err();
        match err {
            TransformError::InvalidJsonArg { line_number, .. } => assert_eq!(line_number, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nested_aug_code_extraction() {
        let src = concat!(
            "//aug<outer\n",
            "//:inner arg\n",
            "body\n",
            "//.child\n",
            "//aug>\n",
            "//:end arg\n",
            "tail\n",
        );
        let ast = builder().parse(src, "").unwrap();
        let aug_codes = transformer().extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(aug_codes.len(), 1);
        let aug = &aug_codes[0];
        assert!(aug.nested_block_used);
        assert_eq!(aug.line_number, 1);
        assert_eq!(aug.args, vec![json!("inner arg")]);
        assert_eq!(aug.args_excl_end_idx, 1);
        assert_eq!(aug.end_args, vec![json!("end arg")]);
        assert_eq!(aug.end_args_excl_end_idx, Some(2));
        assert_eq!(aug.end_marker_aftermath.as_deref(), Some(""));
        assert_eq!(aug.children.len(), 1);
        let child = &aug.children[0];
        assert_eq!(child.parent_path, vec![0]);
        assert_eq!(child.idx_in_parent, 2);
        assert_eq!(child.line_number, 4);
    }

    #[test]
    fn test_line_numbers_skip_non_aug_blocks() {
        let src = "/*<t\nx\ny\n>*/t\n//.here\n";
        let ast = builder().parse(src, "").unwrap();
        let aug_codes = transformer().extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(aug_codes[0].line_number, 5);
    }

    #[test]
    fn test_gen_code_sections_for_decorated_aug_code() {
        let src = "//.x\n//:arg\n/*<g\nold\n>*/g\nrest\n";
        let ast = builder().parse(src, "").unwrap();
        let t = transformer();
        let aug_codes = t.extract_aug_codes(&ast, 1).unwrap();
        let sections = t.extract_gen_code_sections(&ast, &aug_codes[0]);
        assert_eq!(
            sections,
            vec![GenCodeSection {
                parent_path: vec![],
                idx_in_parent: 2,
                escaped_block_used: true,
            }]
        );
    }

    #[test]
    fn test_gen_code_section_search_stops_at_next_aug_code() {
        let src = "//.first\nplain\n//.second\n/*<g\nold\n>*/g\n";
        let ast = builder().parse(src, "").unwrap();
        let t = transformer();
        let aug_codes = t.extract_aug_codes(&ast, 1).unwrap();
        assert_eq!(aug_codes.len(), 2);
        assert!(t.extract_gen_code_sections(&ast, &aug_codes[0]).is_empty());
        let sections = t.extract_gen_code_sections(&ast, &aug_codes[1]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].idx_in_parent, 3);
    }

    #[test]
    fn test_nested_sections_exclude_child_claims() {
        let src = concat!(
            "//aug<outer\n",
            "/*<a\n",
            ">*/a\n",
            "//.child\n",
            "/*<b\n",
            ">*/b\n",
            "//aug>\n",
        );
        let ast = builder().parse(src, "").unwrap();
        let t = transformer();
        let aug_codes = t.extract_aug_codes(&ast, 1).unwrap();
        let sections = t.extract_gen_code_sections(&ast, &aug_codes[0]);
        // The slot at index 2 belongs to the child aug code; only the slot
        // at index 0 remains for the outer region (it has no last slot at
        // the parent level).
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].parent_path, vec![0]);
        assert_eq!(sections[0].idx_in_parent, 0);
    }
}

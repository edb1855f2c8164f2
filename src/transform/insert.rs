//! Construction of generated-code nodes and the slot merge algorithm.
//!
//! Generator results arrive as [`GeneratedCode`] values, one intended per
//! generated-code slot of a region. Existing slots with a matching result
//! are replaced, slots without one are deleted (unless the last processed
//! result set `ignore_remainder`), and excess results are appended after
//! the last slot, or after the region's arguments when no slot exists.
//! Content is normalized line by line with exact control over indentation
//! and terminator reproduction before being wrapped in the requested node
//! kind.

use serde::{Deserialize, Serialize};

use crate::ast::nodes::EscapedBlockAttrs;
use crate::ast::{AstNode, DecoratedLine, EscapedBlock, NodePath, SourceAst, UndecoratedLine};
use crate::lines::{is_blank, split_into_lines, Line};

use super::extract::{AugCode, GenCodeSection};
use super::{AstTransformer, TransformError};

/// Kind of node a generated-code result should be wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenCodeMarkerType {
    /// Verbatim multi-line block bounded by generated-code markers.
    #[default]
    EscapedBlock,
    /// Single decorated line carrying the first content line.
    Inline,
    /// Raw undecorated lines with no marker decoration at all.
    PlainLines,
}

/// One fragment of generated content, with optional per-fragment overrides
/// of the result's indentation and terminator defaults. Exempt fragments
/// are inserted verbatim, bypassing line splitting and indentation, which
/// lets generators join fragments across logical line boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentPart {
    pub content: String,
    pub exempt: bool,
    pub indent: Option<String>,
    pub line_sep: Option<String>,
}

impl ContentPart {
    pub fn new(content: impl Into<String>) -> Self {
        ContentPart {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn exempt(content: impl Into<String>) -> Self {
        ContentPart {
            content: content.into(),
            exempt: true,
            ..Default::default()
        }
    }
}

/// Output contract of user generator functions for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratedCode {
    pub content_parts: Vec<ContentPart>,
    /// Indent prefix applied to non-exempt content lines.
    pub indent: Option<String>,
    /// Terminator replacing each content line's own, when set.
    pub line_sep: Option<String>,
    pub marker_type: GenCodeMarkerType,
    /// Suppresses this slot entirely; the existing content stays.
    pub ignore: bool,
    /// Stops the merge from touching any further slots of the region.
    pub ignore_remainder: bool,
}

impl GeneratedCode {
    /// A result holding a single plain content fragment.
    pub fn from_content(content: impl Into<String>) -> Self {
        GeneratedCode {
            content_parts: vec![ContentPart::new(content)],
            ..Default::default()
        }
    }
}

/// A single structural edit to one child list.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformAction {
    Replace(Vec<AstNode>),
    Insert(Vec<AstNode>),
    Delete,
}

/// One planned edit, addressed with pre-edit coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AstTransformSpec {
    pub parent_path: NodePath,
    pub child_index: usize,
    pub action: TransformAction,
}

/// Record of an applied edit, used to shift positions held by descriptors
/// that still refer to pre-edit coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildListEdit {
    pub parent_path: NodePath,
    pub index: usize,
    pub removed: usize,
    pub added: usize,
}

struct SectionTransform {
    ignore: bool,
    ignore_remainder: bool,
    nodes: Vec<AstNode>,
}

/// Splits content fragments into lines and applies effective indentation
/// and terminators.
///
/// Non-exempt lines receive the effective indent unless blank, and their
/// terminators are replaced by the effective terminator when one is
/// configured. A fragment not ending on a terminator is continued by the
/// next fragment on the same line. When any fragments were supplied, the
/// result holds at least one line, and its final terminator is forced to
/// `line_sep` unless the last fragment was exempt.
pub fn extract_lines_and_terminators(
    content_parts: &[ContentPart],
    indent: Option<&str>,
    line_sep: Option<&str>,
) -> Vec<Line> {
    let mut parts = content_parts.to_vec();
    repair_split_crlfs(&mut parts);

    let mut all_lines: Vec<Line> = Vec::new();
    let mut last_part_is_exempt_and_empty = false;
    let mut last_part_ended_with_line_sep = true;
    let mut last_part_is_exempt = false;
    for part in &parts {
        if part.content.is_empty() {
            if part.exempt {
                last_part_is_exempt_and_empty = true;
                last_part_is_exempt = true;
            }
            continue;
        }
        let part_indent = part.indent.as_deref().or(indent);
        let part_line_sep = part.line_sep.as_deref().or(line_sep);
        for (j, line) in split_into_lines(&part.content).into_iter().enumerate() {
            let mut terminator = line.terminator;
            if !terminator.is_empty() && !part.exempt {
                if let Some(sep) = part_line_sep {
                    terminator = sep.to_string();
                }
            }
            if j > 0 || last_part_ended_with_line_sep {
                // Blank lines are not indented, mirroring what editors do.
                let mut effective_indent = "";
                if let Some(ind) = part_indent {
                    if !part.exempt && !last_part_is_exempt_and_empty && !is_blank(&line.text) {
                        effective_indent = ind;
                    }
                }
                all_lines.push(Line::new(
                    format!("{}{}", effective_indent, line.text),
                    terminator,
                ));
            } else if let Some(last) = all_lines.last_mut() {
                // The previous fragment ended mid-line; continue it with no
                // further indentation and take over its empty terminator.
                last.text.push_str(&line.text);
                last.terminator = terminator;
            }
        }
        last_part_is_exempt = part.exempt;
        last_part_is_exempt_and_empty = false;
        last_part_ended_with_line_sep = all_lines
            .last()
            .map(|l| !l.terminator.is_empty())
            .unwrap_or(false);
    }

    // Distinguish an empty fragment list from fragments with empty
    // contents, and guarantee an ending terminator when one is configured
    // (leaving it off is the generator's way to skip trailing newlines).
    if !parts.is_empty() {
        if all_lines.is_empty() {
            all_lines.push(Line::new("", ""));
        }
        if let Some(sep) = line_sep {
            if !last_part_is_exempt {
                if let Some(last) = all_lines.last_mut() {
                    last.terminator = sep.to_string();
                }
            }
        }
    }
    all_lines
}

/// Rejoins `\r\n` pairs split across fragment boundaries, so terminator
/// detection is never fooled by an arbitrary split point.
fn repair_split_crlfs(parts: &mut [ContentPart]) {
    for i in 0..parts.len().saturating_sub(1) {
        let split_here = parts[i].content.ends_with('\r') && parts[i + 1].content.starts_with('\n');
        if split_here {
            parts[i].content.push('\n');
            parts[i + 1].content.remove(0);
        }
    }
}

/// Applies insert/replace/delete operations to child lists.
///
/// Correct operation requires of `specs`: indices per child list arranged
/// in ascending order, no index deleted more than once, and insertions
/// appearing only after all other spec kinds. All indices are pre-edit;
/// the specs are applied from last to first so that earlier indices stay
/// valid throughout.
pub fn perform_transformations(
    ast: &mut SourceAst,
    specs: Vec<AstTransformSpec>,
) -> Result<Vec<ChildListEdit>, TransformError> {
    let mut edits = Vec::with_capacity(specs.len());
    for spec in &specs {
        let (removed, added) = match &spec.action {
            TransformAction::Replace(nodes) => (1, nodes.len()),
            TransformAction::Insert(nodes) => (0, nodes.len()),
            TransformAction::Delete => (1, 0),
        };
        edits.push(ChildListEdit {
            parent_path: spec.parent_path.clone(),
            index: spec.child_index,
            removed,
            added,
        });
    }
    for spec in specs.into_iter().rev() {
        let list = ast.child_list_mut(&spec.parent_path).ok_or_else(|| {
            TransformError::InvalidNodePath(format!("no child list at {:?}", spec.parent_path))
        })?;
        let end = match spec.action {
            TransformAction::Insert(_) => list.len(),
            _ => list.len().saturating_sub(1),
        };
        if spec.child_index > end {
            return Err(TransformError::InvalidNodePath(format!(
                "child index {} out of bounds at {:?}",
                spec.child_index, spec.parent_path
            )));
        }
        match spec.action {
            TransformAction::Replace(nodes) => {
                list.splice(spec.child_index..spec.child_index + 1, nodes);
            }
            TransformAction::Insert(nodes) => {
                list.splice(spec.child_index..spec.child_index, nodes);
            }
            TransformAction::Delete => {
                list.remove(spec.child_index);
            }
        }
    }
    Ok(edits)
}

fn shift_index(p: usize, edits: &[ChildListEdit], path: &[usize]) -> usize {
    let mut delta = 0isize;
    for e in edits {
        if e.parent_path == path && p >= e.index + e.removed {
            delta += e.added as isize - e.removed as isize;
        }
    }
    (p as isize + delta).max(0) as usize
}

/// Like [`shift_index`] but for exclusive end bounds: an insertion exactly
/// at the bound lies outside the region and must not extend it.
fn shift_bound(p: usize, edits: &[ChildListEdit], path: &[usize]) -> usize {
    let mut delta = 0isize;
    for e in edits {
        if e.parent_path != path {
            continue;
        }
        let affected = if e.removed == 0 {
            p > e.index
        } else {
            p >= e.index + e.removed
        };
        if affected {
            delta += e.added as isize - e.removed as isize;
        }
    }
    (p as isize + delta).max(0) as usize
}

/// Shifts descriptor positions still expressed in pre-edit coordinates by
/// the effects of a batch of applied edits. Call after
/// [`perform_transformations`] on every descriptor of the file that has
/// not been applied yet.
pub fn shift_aug_codes(aug_codes: &mut [AugCode], edits: &[ChildListEdit]) {
    for aug_code in aug_codes {
        shift_aug_code(aug_code, edits);
    }
}

fn shift_aug_code(aug_code: &mut AugCode, edits: &[ChildListEdit]) {
    let parent_path = aug_code.parent_path.clone();
    let mut own_path = parent_path.clone();
    own_path.push(aug_code.idx_in_parent);

    let new_idx = shift_index(aug_code.idx_in_parent, edits, &parent_path);
    let args_path: &[usize] = if aug_code.nested_block_used {
        &own_path
    } else {
        &parent_path
    };
    let new_args_excl = shift_bound(aug_code.args_excl_end_idx, edits, args_path);
    let new_end_args_excl = aug_code
        .end_args_excl_end_idx
        .map(|p| shift_bound(p, edits, &parent_path));

    let mut new_parent_path = parent_path.clone();
    for level in 0..new_parent_path.len() {
        new_parent_path[level] = shift_index(parent_path[level], edits, &parent_path[..level]);
    }

    aug_code.parent_path = new_parent_path;
    aug_code.idx_in_parent = new_idx;
    aug_code.args_excl_end_idx = new_args_excl;
    aug_code.end_args_excl_end_idx = new_end_args_excl;
    for child in &mut aug_code.children {
        shift_aug_code(child, edits);
    }
}

impl AstTransformer {
    /// Merges one region's generator results into the tree and returns the
    /// applied edits for descriptor fix-up.
    ///
    /// `gen_codes` holds one entry per slot in region order; `None` deletes
    /// the slot. Excess entries are appended after the last slot (or after
    /// the region's arguments when no slot exists). For a nested region,
    /// all but the last entry target the block interior and the last entry
    /// targets the parent level after the end line; for a decorated-line
    /// region only the last entry is considered.
    pub fn apply_generated_codes(
        &self,
        ast: &mut SourceAst,
        aug_code: &AugCode,
        gen_codes: &[Option<GeneratedCode>],
    ) -> Result<Vec<ChildListEdit>, TransformError> {
        let sections = self.extract_gen_code_sections(ast, aug_code);
        let aug_node = ast
            .node_at(&aug_code.parent_path, aug_code.idx_in_parent)
            .ok_or_else(|| {
                TransformError::InvalidNodePath(format!(
                    "no augmenting code node at {:?}[{}]",
                    aug_code.parent_path, aug_code.idx_in_parent
                ))
            })?;
        let mut specs = Vec::new();
        match aug_node {
            AstNode::NestedBlock(block) if aug_code.nested_block_used => {
                // The last result belongs after the block's end line; any
                // earlier results belong inside the block. A discovered
                // last slot already sitting at the parent level is handed
                // to the tail processing.
                let reduction = match sections.last() {
                    Some(last) if last.parent_path == aug_code.parent_path => 1,
                    _ => 0,
                };
                let split_codes = gen_codes.len().saturating_sub(1);
                let split_sections = sections.len() - reduction;
                let (indent, line_sep) = (block.indent.clone(), block.line_sep.clone());
                let (end_indent, end_line_sep) =
                    (block.end_indent.clone(), block.end_line_sep.clone());
                self.add_aug_code_transforms(
                    ast,
                    aug_code,
                    false,
                    &indent,
                    &line_sep,
                    &gen_codes[..split_codes],
                    &sections[..split_sections],
                    &mut specs,
                )?;
                self.add_aug_code_transforms(
                    ast,
                    aug_code,
                    true,
                    &end_indent,
                    &end_line_sep,
                    &gen_codes[split_codes..],
                    &sections[split_sections..],
                    &mut specs,
                )?;
            }
            AstNode::DecoratedLine(line) if !aug_code.nested_block_used => {
                // Only the last result is meaningful for a single-line
                // region.
                let tail = match gen_codes.len() {
                    0 => &[][..],
                    n => &gen_codes[n - 1..],
                };
                let (indent, line_sep) = (line.indent.clone(), line.line_sep.clone());
                self.add_aug_code_transforms(
                    ast, aug_code, true, &indent, &line_sep, tail, &sections, &mut specs,
                )?;
            }
            _ => {
                return Err(TransformError::InvalidNodePath(format!(
                    "augmenting code node kind changed at {:?}[{}]",
                    aug_code.parent_path, aug_code.idx_in_parent
                )));
            }
        }
        perform_transformations(ast, specs)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_aug_code_transforms(
        &self,
        ast: &SourceAst,
        aug_code: &AugCode,
        transform_parent_of_aug_code_node: bool,
        default_indent: &str,
        default_line_sep: &str,
        gen_codes: &[Option<GeneratedCode>],
        sections: &[GenCodeSection],
        dest: &mut Vec<AstTransformSpec>,
    ) -> Result<(), TransformError> {
        let mut section_transforms: Vec<Option<SectionTransform>> = Vec::new();
        let min_sections = gen_codes.len().min(sections.len());
        for i in 0..min_sections {
            let gen_code = match &gen_codes[i] {
                Some(gc) => gc,
                None => {
                    section_transforms.push(None);
                    continue;
                }
            };
            let mut transform = SectionTransform {
                ignore: gen_code.ignore,
                ignore_remainder: gen_code.ignore_remainder,
                nodes: Vec::new(),
            };
            if !transform.ignore {
                let section = &sections[i];
                let section_node = ast
                    .node_at(&section.parent_path, section.idx_in_parent)
                    .ok_or_else(|| {
                        TransformError::InvalidNodePath(format!(
                            "no generated code node at {:?}[{}]",
                            section.parent_path, section.idx_in_parent
                        ))
                    })?;
                let section_line_sep = match section_node {
                    AstNode::DecoratedLine(n) => &n.line_sep,
                    AstNode::EscapedBlock(n) => &n.line_sep,
                    _ => {
                        return Err(TransformError::InvalidNodePath(format!(
                            "generated code node kind changed at {:?}[{}]",
                            section.parent_path, section.idx_in_parent
                        )));
                    }
                };
                let effective_sep = gen_code.line_sep.as_deref().unwrap_or(section_line_sep);
                let lines = extract_lines_and_terminators(
                    &gen_code.content_parts,
                    gen_code.indent.as_deref(),
                    Some(effective_sep),
                );
                transform.nodes = self.create_gen_code_nodes(
                    &lines,
                    gen_code.marker_type,
                    Some(section_node),
                    default_indent,
                    default_line_sep,
                )?;
            }
            section_transforms.push(Some(transform));
        }
        for gen_code in gen_codes.iter().skip(min_sections) {
            let gen_code = match gen_code {
                Some(gc) => gc,
                None => {
                    section_transforms.push(None);
                    continue;
                }
            };
            let mut transform = SectionTransform {
                ignore: gen_code.ignore,
                ignore_remainder: gen_code.ignore_remainder,
                nodes: Vec::new(),
            };
            if !transform.ignore {
                let effective_sep = gen_code.line_sep.as_deref().unwrap_or(default_line_sep);
                let lines = extract_lines_and_terminators(
                    &gen_code.content_parts,
                    gen_code.indent.as_deref(),
                    Some(effective_sep),
                );
                transform.nodes = self.create_gen_code_nodes(
                    &lines,
                    gen_code.marker_type,
                    None,
                    default_indent,
                    default_line_sep,
                )?;
            }
            section_transforms.push(Some(transform));
        }
        compute_aug_code_transforms(
            aug_code,
            transform_parent_of_aug_code_node,
            sections,
            &section_transforms,
            dest,
        );
        Ok(())
    }

    /// Builds the nodes realizing one generator result. Replacing an
    /// existing slot of the same node kind re-uses its marker, indent and
    /// terminator; otherwise the configured default markers are required.
    fn create_gen_code_nodes(
        &self,
        gen_code_lines: &[Line],
        marker_type: GenCodeMarkerType,
        existing_node: Option<&AstNode>,
        default_indent: &str,
        default_line_sep: &str,
    ) -> Result<Vec<AstNode>, TransformError> {
        match marker_type {
            GenCodeMarkerType::Inline => {
                let content = gen_code_lines
                    .first()
                    .map(|l| l.text.as_str())
                    .unwrap_or("");
                let node = match existing_node {
                    Some(AstNode::DecoratedLine(n)) => {
                        DecoratedLine::create(content, &n.indent, &n.marker, &n.line_sep)?
                    }
                    _ => {
                        let marker = self.default_gen_code_inline_marker.as_deref().ok_or(
                            TransformError::MissingDefaultMarker(
                                "default generated code inline marker",
                            ),
                        )?;
                        DecoratedLine::create(content, default_indent, marker, default_line_sep)?
                    }
                };
                Ok(vec![AstNode::DecoratedLine(node)])
            }
            GenCodeMarkerType::EscapedBlock => {
                let attrs = match existing_node {
                    Some(AstNode::EscapedBlock(n)) => EscapedBlockAttrs {
                        marker_aftermath: n.marker_aftermath.clone(),
                        indent: n.indent.clone(),
                        marker: n.marker.clone(),
                        line_sep: n.line_sep.clone(),
                        end_indent: n.end_indent.clone(),
                        end_marker: n.end_marker.clone(),
                        end_line_sep: n.end_line_sep.clone(),
                    },
                    _ => {
                        let start = self.default_gen_code_start_marker.as_deref().ok_or(
                            TransformError::MissingDefaultMarker(
                                "default generated code start marker",
                            ),
                        )?;
                        let end = self.default_gen_code_end_marker.as_deref().ok_or(
                            TransformError::MissingDefaultMarker(
                                "default generated code end marker",
                            ),
                        )?;
                        EscapedBlockAttrs {
                            marker_aftermath: String::new(),
                            indent: default_indent.to_string(),
                            marker: start.to_string(),
                            line_sep: default_line_sep.to_string(),
                            end_indent: default_indent.to_string(),
                            end_marker: end.to_string(),
                            end_line_sep: default_line_sep.to_string(),
                        }
                    }
                };
                let node = EscapedBlock::create(gen_code_lines, attrs)?;
                Ok(vec![AstNode::EscapedBlock(node)])
            }
            GenCodeMarkerType::PlainLines => Ok(gen_code_lines
                .iter()
                .map(|l| {
                    AstNode::UndecoratedLine(UndecoratedLine {
                        text: l.text.clone(),
                        line_sep: l.terminator.clone(),
                    })
                })
                .collect()),
        }
    }
}

/// Determines the edits that keep a region in sync with its generator
/// results, given the discovered slots and the per-slot transforms.
fn compute_aug_code_transforms(
    aug_code: &AugCode,
    transform_parent_of_aug_code_node: bool,
    sections: &[GenCodeSection],
    transforms: &[Option<SectionTransform>],
    dest: &mut Vec<AstTransformSpec>,
) {
    let min_sections = transforms.len().min(sections.len());

    // Slots with a corresponding result: replace, or delete on None.
    for i in 0..min_sections {
        let section = &sections[i];
        match &transforms[i] {
            None => dest.push(AstTransformSpec {
                parent_path: section.parent_path.clone(),
                child_index: section.idx_in_parent,
                action: TransformAction::Delete,
            }),
            Some(t) if !t.ignore => dest.push(AstTransformSpec {
                parent_path: section.parent_path.clone(),
                child_index: section.idx_in_parent,
                action: TransformAction::Replace(t.nodes.clone()),
            }),
            _ => {}
        }
    }

    // Surplus slots are deleted unless the remainder is to be ignored.
    let ignore_remainder = match transforms.last() {
        Some(Some(last)) => last.ignore_remainder,
        _ => false,
    };
    if !ignore_remainder {
        for section in sections.iter().skip(min_sections) {
            dest.push(AstTransformSpec {
                parent_path: section.parent_path.clone(),
                child_index: section.idx_in_parent,
                action: TransformAction::Delete,
            });
        }
    }

    // Surplus results are appended right after the last slot, or after
    // the region's arguments when it never had slots.
    let target_path = if transform_parent_of_aug_code_node {
        aug_code.parent_path.clone()
    } else {
        let mut p = aug_code.parent_path.clone();
        p.push(aug_code.idx_in_parent);
        p
    };
    let target_index = match sections.last() {
        Some(last) => last.idx_in_parent + 1,
        None => {
            if aug_code.nested_block_used && transform_parent_of_aug_code_node {
                aug_code
                    .end_args_excl_end_idx
                    .unwrap_or(aug_code.args_excl_end_idx)
            } else {
                aug_code.args_excl_end_idx
            }
        }
    };
    for transform in transforms.iter().skip(min_sections) {
        if let Some(t) = transform {
            if !t.ignore {
                dest.push(AstTransformSpec {
                    parent_path: target_path.clone(),
                    child_index: target_index,
                    action: TransformAction::Insert(t.nodes.clone()),
                });
            }
        }
    }
}

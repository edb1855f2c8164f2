//! Augmenting-code extraction and generated-code insertion.
//!
//! The extractor walks a parsed tree and produces one descriptor per
//! augmenting-code region, with consolidated argument values and positional
//! metadata expressed as index paths into the tree. The inserter takes a
//! descriptor plus the results returned by a generator and computes an
//! order-preserving set of child-list edits (replace, delete, append)
//! against the original tree, then applies them in a single pass.
//!
//! Positions use pre-edit indices throughout. Applying one region's edits
//! shifts the positions of regions that follow it in the same child list;
//! [`shift_aug_codes`] adjusts the remaining descriptors by the recorded
//! [`ChildListEdit`]s so a file with several regions can be processed in
//! strict source order without index drift.

pub mod extract;
pub mod insert;

use std::fmt;

use crate::ast::NodeError;
use crate::markers::MarkerSet;

pub use extract::{AugCode, GenCodeSection};
pub use insert::{
    extract_lines_and_terminators, perform_transformations, shift_aug_codes, AstTransformSpec,
    ChildListEdit, ContentPart, GenCodeMarkerType, GeneratedCode, TransformAction,
};

/// Errors raised while extracting augmenting code or inserting generated
/// code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// An argument flagged as JSON failed to parse.
    InvalidJsonArg { line_number: usize, message: String },
    /// A default marker needed to synthesize a brand-new generated-code
    /// node was not configured.
    MissingDefaultMarker(&'static str),
    /// A descriptor's position no longer resolves to a matching node.
    InvalidNodePath(String),
    /// A synthesized node failed validation.
    Node(NodeError),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::InvalidJsonArg {
                line_number,
                message,
            } => {
                write!(f, "invalid JSON argument at line {}: {}", line_number, message)
            }
            TransformError::MissingDefaultMarker(which) => {
                write!(f, "{} not set", which)
            }
            TransformError::InvalidNodePath(msg) => {
                write!(f, "invalid node path: {}", msg)
            }
            TransformError::Node(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TransformError {}

impl From<NodeError> for TransformError {
    fn from(e: NodeError) -> Self {
        TransformError::Node(e)
    }
}

/// Locates augmenting-code regions and keeps them in sync with generated
/// code, driven by marker membership on already-parsed nodes.
///
/// Unlike the parser's prefix matching, all marker tests here compare
/// whole markers already isolated by the parser, so the sets are consulted
/// with exact membership.
#[derive(Debug, Clone)]
pub struct AstTransformer {
    pub aug_code_markers: MarkerSet,
    pub aug_code_arg_markers: MarkerSet,
    pub aug_code_json_arg_markers: MarkerSet,
    pub aug_code_arg_sep_markers: MarkerSet,
    pub gen_code_markers: MarkerSet,
    pub default_gen_code_inline_marker: Option<String>,
    pub default_gen_code_start_marker: Option<String>,
    pub default_gen_code_end_marker: Option<String>,
}

impl Default for AstTransformer {
    fn default() -> Self {
        AstTransformer {
            aug_code_markers: MarkerSet::compile(&[]),
            aug_code_arg_markers: MarkerSet::compile(&[]),
            aug_code_json_arg_markers: MarkerSet::compile(&[]),
            aug_code_arg_sep_markers: MarkerSet::compile(&[]),
            gen_code_markers: MarkerSet::compile(&[]),
            default_gen_code_inline_marker: None,
            default_gen_code_start_marker: None,
            default_gen_code_end_marker: None,
        }
    }
}

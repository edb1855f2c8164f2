//! AST definitions and utilities for marker-aware source text.
//!
//! - `nodes` - the node types, validated constructors and path addressing
//! - `builder` - recursive-descent parsing of line streams into trees
//! - `formatter` - the exact structural inverse of the builder

pub mod builder;
pub mod formatter;
pub mod nodes;

pub use builder::{AstBuilder, ParseError};
pub use formatter::{stringify, stringify_node, stringify_nodes};
pub use nodes::{
    AstNode, DecoratedLine, EscapedBlock, NestedBlock, NodeError, NodePath, SourceAst,
    UndecoratedLine,
};

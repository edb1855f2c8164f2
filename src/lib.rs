//! # codeaug
//!
//! A marker-driven engine for augmenting source text with generated code.
//!
//! Text is parsed into a line-oriented AST that distinguishes plain lines
//! from decorated marker lines, escaped verbatim blocks and nested blocks.
//! Regions marked as "augmenting code" are located together with their
//! arguments, user-supplied generators are invoked for each region, and the
//! generated output is spliced back into the tree before the tree is
//! serialized byte-for-byte outside the modified regions.
//!
//! The crate is organized leaf-first:
//!
//! - [`lines`] - line splitting with exact terminator preservation
//! - [`markers`] - longest-match selection over literal marker strings
//! - [`ast`] - node types, the recursive-descent builder and the serializer
//! - [`transform`] - augmenting-code extraction and generated-code insertion
//! - [`diff`] - Unix normal-diff output
//! - [`change`] - change detection and conditional file emission
//! - [`processor`] - generator dispatch, scopes and per-file orchestration
//! - [`config`] - marker configuration loading

pub mod ast;
pub mod change;
pub mod config;
pub mod diff;
pub mod lines;
pub mod markers;
pub mod processor;
pub mod transform;

//! Recursive-descent parsing of line streams into marker-aware trees.
//!
//! The builder walks a cursor over the split lines of a file. At each
//! position it first rejects dangling block end lines, then tries a nested
//! block start, an escaped block start and a decorated line in that order,
//! finally consuming one plain line unconditionally. Any structural
//! mismatch aborts the whole parse with a [`ParseError`] carrying the
//! source path and 1-based line number.

use std::fmt;

use crate::lines::{determine_indent, split_into_lines};
use crate::markers::MarkerSet;

use super::nodes::{
    AstNode, DecoratedLine, EscapedBlock, NestedBlock, SourceAst, UndecoratedLine,
};

/// Fatal structural parse failure. There is no recovery; the whole file
/// parse aborts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub src_path: String,
    pub line_number: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.src_path.is_empty() {
            write!(f, "at line {}: {}", self.line_number, self.message)
        } else {
            write!(
                f,
                "in {} at line {}: {}",
                self.src_path, self.line_number, self.message
            )
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses source text into a [`SourceAst`] using configured marker sets.
#[derive(Debug, Clone)]
pub struct AstBuilder {
    pub decorated_line_markers: MarkerSet,
    pub escaped_block_start_markers: MarkerSet,
    pub escaped_block_end_markers: MarkerSet,
    pub nested_block_start_markers: MarkerSet,
    pub nested_block_end_markers: MarkerSet,
}

impl Default for AstBuilder {
    fn default() -> Self {
        AstBuilder {
            decorated_line_markers: MarkerSet::compile(&[]),
            escaped_block_start_markers: MarkerSet::compile(&[]),
            escaped_block_end_markers: MarkerSet::compile(&[]),
            nested_block_start_markers: MarkerSet::compile(&[]),
            nested_block_end_markers: MarkerSet::compile(&[]),
        }
    }
}

impl AstBuilder {
    /// Parses a whole file. `src_path` is used only for error context and
    /// may be empty.
    pub fn parse(&self, source: &str, src_path: &str) -> Result<SourceAst, ParseError> {
        let lines: Vec<RawLine> = split_into_lines(source)
            .into_iter()
            .map(|l| {
                let indent_len = determine_indent(&l.text).len();
                RawLine {
                    text: l.text,
                    line_sep: l.terminator,
                    indent_len,
                }
            })
            .collect();
        let mut run = ParseRun {
            builder: self,
            lines,
            pos: 0,
            src_path,
        };
        let mut root = SourceAst::default();
        while let Some(child) = run.match_any()? {
            root.children.push(child);
        }
        Ok(root)
    }
}

struct RawLine {
    text: String,
    line_sep: String,
    indent_len: usize,
}

impl RawLine {
    fn content(&self) -> &str {
        &self.text[self.indent_len..]
    }

    fn indent(&self) -> &str {
        &self.text[..self.indent_len]
    }
}

struct ParseRun<'a> {
    builder: &'a AstBuilder,
    lines: Vec<RawLine>,
    pos: usize,
    src_path: &'a str,
}

impl<'a> ParseRun<'a> {
    fn peek(&self) -> Option<&RawLine> {
        self.lines.get(self.pos)
    }

    fn abort(&self, line_number: usize, message: &str) -> ParseError {
        ParseError {
            src_path: self.src_path.to_string(),
            line_number,
            message: message.to_string(),
        }
    }

    fn match_any(&mut self) -> Result<Option<AstNode>, ParseError> {
        let line = match self.peek() {
            Some(line) => line,
            None => return Ok(None),
        };
        if self
            .builder
            .nested_block_end_markers
            .find_match(line.content())
            .is_some()
        {
            return Err(self.abort(
                self.pos + 1,
                "encountered nested block end line without matching start line",
            ));
        }
        if let Some(n) = self.match_nested_block()? {
            return Ok(Some(n));
        }
        if let Some(n) = self.match_escaped_block()? {
            return Ok(Some(n));
        }
        // An escaped block end line at this level has no open block to
        // close; inside a block body it would have been captured verbatim.
        let line = &self.lines[self.pos];
        if self
            .builder
            .escaped_block_end_markers
            .find_match(line.content())
            .is_some()
        {
            return Err(self.abort(
                self.pos + 1,
                "encountered escaped block end line without matching start line",
            ));
        }
        if let Some(n) = self.match_decorated_line()? {
            return Ok(Some(n));
        }
        let line = &self.lines[self.pos];
        let n = AstNode::UndecoratedLine(UndecoratedLine {
            text: line.text.clone(),
            line_sep: line.line_sep.clone(),
        });
        self.pos += 1;
        Ok(Some(n))
    }

    fn match_nested_block(&mut self) -> Result<Option<AstNode>, ParseError> {
        let line = &self.lines[self.pos];
        let m = match self
            .builder
            .nested_block_start_markers
            .find_match(line.content())
        {
            Some(m) => m,
            None => return Ok(None),
        };
        let mut parent = NestedBlock {
            indent: line.indent().to_string(),
            marker: m.marker.to_string(),
            marker_aftermath: m.aftermath.to_string(),
            line_sep: line.line_sep.clone(),
            end_indent: String::new(),
            end_marker: String::new(),
            end_marker_aftermath: String::new(),
            end_line_sep: String::new(),
            children: Vec::new(),
        };
        self.pos += 1;
        let start_line_number = self.pos;
        loop {
            let line = match self.peek() {
                Some(line) => line,
                None => {
                    return Err(self.abort(
                        start_line_number,
                        "matching nested block end line not found",
                    ));
                }
            };
            if let Some(m) = self
                .builder
                .nested_block_end_markers
                .find_match(line.content())
            {
                parent.end_indent = line.indent().to_string();
                parent.end_line_sep = line.line_sep.clone();
                parent.end_marker = m.marker.to_string();
                parent.end_marker_aftermath = m.aftermath.to_string();
                self.pos += 1;
                break;
            }
            // Any end line belonging to a deeper block is consumed by the
            // recursive call, never by this loop.
            match self.match_any()? {
                Some(child) => parent.children.push(child),
                None => unreachable!("peek returned a line"),
            }
        }
        Ok(Some(AstNode::NestedBlock(parent)))
    }

    fn match_escaped_block(&mut self) -> Result<Option<AstNode>, ParseError> {
        let line = &self.lines[self.pos];
        let m = match self
            .builder
            .escaped_block_start_markers
            .find_match(line.content())
        {
            Some(m) => m,
            None => return Ok(None),
        };
        let mut parent = EscapedBlock {
            indent: line.indent().to_string(),
            marker: m.marker.to_string(),
            marker_aftermath: m.aftermath.to_string(),
            line_sep: line.line_sep.clone(),
            end_indent: String::new(),
            end_marker: String::new(),
            end_line_sep: String::new(),
            children: Vec::new(),
        };
        self.pos += 1;
        let start_line_number = self.pos;
        loop {
            let line = match self.peek() {
                Some(line) => line,
                None => {
                    return Err(self.abort(
                        start_line_number,
                        "matching escaped block end line not found",
                    ));
                }
            };
            let end_match = self
                .builder
                .escaped_block_end_markers
                .find_match(line.content());
            match end_match {
                // The end line must also repeat the start line's aftermath,
                // which is the tag distinguishing this block's closing line
                // from those of neighboring same-marker blocks.
                Some(m) if m.aftermath == parent.marker_aftermath => {
                    parent.end_indent = line.indent().to_string();
                    parent.end_line_sep = line.line_sep.clone();
                    parent.end_marker = m.marker.to_string();
                    self.pos += 1;
                    break;
                }
                _ => {
                    parent.children.push(UndecoratedLine {
                        text: line.text.clone(),
                        line_sep: line.line_sep.clone(),
                    });
                    self.pos += 1;
                }
            }
        }
        Ok(Some(AstNode::EscapedBlock(parent)))
    }

    fn match_decorated_line(&mut self) -> Result<Option<AstNode>, ParseError> {
        let line = &self.lines[self.pos];
        let m = match self
            .builder
            .decorated_line_markers
            .find_match(line.content())
        {
            Some(m) => m,
            None => return Ok(None),
        };
        // Decorated lines are never the unterminated final line of a file.
        if line.line_sep.is_empty() {
            return Err(self.abort(self.pos + 1, "decorated line is missing a line terminator"));
        }
        let n = DecoratedLine {
            indent: line.indent().to_string(),
            marker: m.marker.to_string(),
            marker_aftermath: m.aftermath.to_string(),
            line_sep: line.line_sep.clone(),
        };
        self.pos += 1;
        Ok(Some(AstNode::DecoratedLine(n)))
    }
}

//! Line splitting with exact terminator preservation.
//!
//! Everything in this crate that touches raw text goes through
//! [`split_into_lines`], which recognizes `\n`, `\r\n` and `\r` as distinct
//! terminators and keeps their exact bytes. Concatenating the text and
//! terminator of every returned line reproduces the input unchanged, which
//! is what makes byte-for-byte round-tripping of parsed files possible.

use serde::{Deserialize, Serialize};

/// One physical line of text together with the exact bytes of its
/// terminator. Every line except possibly the last one of a file has a
/// non-empty terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub terminator: String,
}

impl Line {
    pub fn new(text: impl Into<String>, terminator: impl Into<String>) -> Self {
        Line {
            text: text.into(),
            terminator: terminator.into(),
        }
    }
}

/// Splits text into lines, treating `\r\n` as a single two-character
/// terminator (a lone `\r` or `\n` that is part of a `\r\n` pair never
/// matches on its own). A final character run without a terminator becomes
/// a line with an empty terminator. Empty input yields no lines.
pub fn split_into_lines(text: &str) -> Vec<Line> {
    let mut result = Vec::new();
    let mut start = 0;
    while let Some((idx, len)) = locate_newline(text, start) {
        result.push(Line::new(&text[start..idx], &text[idx..idx + len]));
        start = idx + len;
    }
    if start < text.len() {
        result.push(Line::new(&text[start..], ""));
    }
    result
}

/// Splits text into whole lines with their terminators attached, as used by
/// the diff routines.
pub fn split_whole_lines(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut start = 0;
    while let Some((idx, len)) = locate_newline(text, start) {
        result.push(text[start..idx + len].to_string());
        start = idx + len;
    }
    if start < text.len() {
        result.push(text[start..].to_string());
    }
    result
}

/// Finds the earliest of `\r\n`, `\n`, `\r` at or after `start`, returning
/// its byte index and length.
fn locate_newline(text: &str, start: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    return Some((i, 2));
                }
                return Some((i, 1));
            }
            b'\n' => return Some((i, 1)),
            _ => i += 1,
        }
    }
    None
}

/// Returns the leading whitespace run of a string.
pub fn determine_indent(value: &str) -> &str {
    let end = value
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[..end]
}

/// Returns true if the string is empty or consists solely of whitespace.
pub fn is_blank(s: &str) -> bool {
    s.chars().all(char::is_whitespace)
}

/// Returns true for the three recognized line terminators. The empty string
/// is not valid here; nodes ending the final unterminated line of a file
/// are handled separately by the builder.
pub fn is_valid_line_terminator(s: &str) -> bool {
    matches!(s, "\n" | "\r" | "\r\n")
}

/// Generates a name with the given prefix which is guaranteed to be absent
/// from `names`. If the prefix is absent in the first place it is returned
/// unchanged; otherwise `-1`, `-2`, ... suffixes are tried in order.
pub fn modify_name_to_be_absent(names: &[String], original: &str) -> String {
    modify_to_be_absent(original, |candidate| {
        names.iter().any(|n| n == candidate)
    })
}

/// Generates a string with the given prefix which is guaranteed not to
/// occur as a substring of any string in `target`.
pub fn modify_text_to_be_absent(target: &[String], original: &str) -> String {
    modify_to_be_absent(original, |candidate| {
        target.iter().any(|t| t.contains(candidate))
    })
}

fn modify_to_be_absent(original: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(original) {
        return original.to_string();
    }
    let mut index = 1u64;
    loop {
        let candidate = format!("{}-{}", original, index);
        if !taken(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

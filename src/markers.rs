//! Longest-match selection over sets of literal marker strings.
//!
//! A marker is a fixed string recognized at the start of a line's content,
//! after its indent. Only "suitable" markers take part in matching: a
//! suitable marker is non-empty, does not start with whitespace (which
//! would make it ambiguous with indentation) and contains no carriage
//! return or line feed. Unsuitable markers are silently dropped when a
//! [`MarkerSet`] is compiled.
//!
//! Among suitable markers that match, the longest one wins, so a marker
//! that is a prefix of another never incorrectly shadows it. Equal-length
//! ties resolve to the earliest marker in iteration order; callers should
//! not rely on tie order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lines::determine_indent;

static EMPTY_SET: Lazy<MarkerSet> = Lazy::new(|| MarkerSet::compile(&[]));

/// Returns true if the marker may take part in line matching.
pub fn is_marker_suitable(marker: &str) -> bool {
    !marker.is_empty()
        && determine_indent(marker).is_empty()
        && !marker.contains('\n')
        && !marker.contains('\r')
}

/// Drops unsuitable markers from a list.
pub fn select_suitable_markers(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .filter(|m| is_marker_suitable(m))
        .cloned()
        .collect()
}

/// Result of matching a line's content against a [`MarkerSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch<'a> {
    /// The matched marker, exactly as registered.
    pub marker: &'a str,
    /// The remainder of the content after the marker.
    pub aftermath: &'a str,
}

/// A compiled set of candidate markers.
///
/// Matching is case-sensitive and character-exact. The set is compiled
/// into an anchored alternation of escaped literals sorted by descending
/// length, so regex alternation order implements longest-match priority.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    markers: Vec<String>,
    pattern: Option<Regex>,
}

impl MarkerSet {
    /// Compiles a marker set, dropping unsuitable markers first.
    pub fn compile(markers: &[String]) -> Self {
        let mut markers = select_suitable_markers(markers);
        // Stable sort keeps registration order among equal lengths.
        markers.sort_by(|x, y| y.len().cmp(&x.len()));
        let pattern = if markers.is_empty() {
            None
        } else {
            let alternation = markers
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            // The alternation is built from escaped literals, so
            // compilation cannot fail.
            Some(Regex::new(&format!("^({})", alternation)).unwrap())
        };
        MarkerSet { markers, pattern }
    }

    /// An empty set that never matches.
    pub fn empty() -> &'static MarkerSet {
        &EMPTY_SET
    }

    /// The suitable markers retained by this set, longest first.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Matches the indent-stripped content of a line, returning the best
    /// (longest, then earliest-registered) marker and the remainder after
    /// it.
    pub fn find_match<'a>(&'a self, content: &'a str) -> Option<MarkerMatch<'a>> {
        let pattern = self.pattern.as_ref()?;
        let m = pattern.captures(content)?;
        let matched = m.get(1).unwrap();
        Some(MarkerMatch {
            marker: matched.as_str(),
            aftermath: &content[matched.end()..],
        })
    }

    /// Returns true if the set contains the given marker verbatim. Used by
    /// the transform layer, which re-identifies markers already isolated by
    /// the parser rather than re-matching line prefixes.
    pub fn contains(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }
}

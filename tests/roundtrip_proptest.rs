//! Property-based tests for the parser and serializer.
//!
//! Documents are generated from the grammar itself (plain lines, decorated
//! lines, escaped blocks, nested blocks, mixed terminators), so every
//! generated input is parseable and the byte-exact round-trip property can
//! be asserted unconditionally.

use proptest::prelude::*;

use codeaug::ast::{stringify, AstBuilder};
use codeaug::diff::print_normal_diff;
use codeaug::lines::{split_into_lines, split_whole_lines};
use codeaug::markers::MarkerSet;

fn markers(list: &[&str]) -> MarkerSet {
    MarkerSet::compile(&list.iter().map(|m| m.to_string()).collect::<Vec<_>>())
}

fn builder() -> AstBuilder {
    AstBuilder {
        decorated_line_markers: markers(&["//:", "//."]),
        escaped_block_start_markers: markers(&["/*<"]),
        escaped_block_end_markers: markers(&[">*/"]),
        nested_block_start_markers: markers(&["//aug<"]),
        nested_block_end_markers: markers(&["//aug>"]),
    }
}

fn terminator() -> impl Strategy<Value = String> {
    prop_oneof![Just("\n"), Just("\r\n"), Just("\r")].prop_map(str::to_string)
}

fn indent() -> impl Strategy<Value = String> {
    "[ \t]{0,4}".prop_map(|s| s)
}

// The alphabet avoids '/', '*', '<' and '>' so generated text can never
// collide with a marker or an escaped block's end tag.
fn safe_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.,=-]{0,24}".prop_map(|s| s)
}

fn plain_line() -> impl Strategy<Value = String> {
    (indent(), safe_text(), terminator()).prop_map(|(ind, text, sep)| format!("{ind}{text}{sep}"))
}

fn decorated_line() -> impl Strategy<Value = String> {
    (indent(), safe_text(), terminator()).prop_map(|(ind, text, sep)| format!("{ind}//:{text}{sep}"))
}

fn escaped_block() -> impl Strategy<Value = String> {
    (
        indent(),
        safe_text(),
        terminator(),
        prop::collection::vec((safe_text(), terminator()), 0..4),
        indent(),
        terminator(),
    )
        .prop_map(|(ind, tag, sep, body, end_ind, end_sep)| {
            let mut out = format!("{ind}/*<{tag}{sep}");
            for (text, line_sep) in body {
                out.push_str(&text);
                out.push_str(&line_sep);
            }
            out.push_str(&format!("{end_ind}>*/{tag}{end_sep}"));
            out
        })
}

fn segment() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        3 => plain_line(),
        2 => decorated_line(),
        1 => escaped_block(),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            indent(),
            safe_text(),
            terminator(),
            prop::collection::vec(inner, 0..4),
            indent(),
            safe_text(),
            terminator(),
        )
            .prop_map(
                |(ind, tag, sep, children, end_ind, end_tag, end_sep)| {
                    let mut out = format!("{ind}//aug<{tag}{sep}");
                    for child in children {
                        out.push_str(&child);
                    }
                    out.push_str(&format!("{end_ind}//aug>{end_tag}{end_sep}"));
                    out
                },
            )
    })
}

fn document() -> impl Strategy<Value = String> {
    (prop::collection::vec(segment(), 0..8), safe_text())
        .prop_map(|(segments, tail)| format!("{}{}", segments.concat(), tail))
}

proptest! {
    #[test]
    fn test_round_trip_identity(doc in document()) {
        let result = builder().parse(&doc, "prop.txt");
        prop_assert!(result.is_ok(), "failed to parse: {:?}", doc);
        let ast = result.unwrap();
        prop_assert_eq!(stringify(&ast), doc);
    }

    #[test]
    fn test_split_into_lines_concat_identity(text in "[a-z \r\n]{0,48}") {
        let lines = split_into_lines(&text);
        let mut rejoined = String::new();
        for line in &lines {
            rejoined.push_str(&line.text);
            rejoined.push_str(&line.terminator);
        }
        prop_assert_eq!(rejoined, text);
        // No line text ever contains a terminator character.
        for line in &lines {
            prop_assert!(!line.text.contains('\n') && !line.text.contains('\r'));
        }
    }

    #[test]
    fn test_diff_against_self_is_empty(doc in document()) {
        let lines = split_whole_lines(&doc);
        prop_assert_eq!(print_normal_diff(&lines, &lines), "");
    }

    #[test]
    fn test_diff_against_distinct_is_non_empty(
        a in "[ab\n]{1,16}",
        b in "[ab\n]{1,16}",
    ) {
        prop_assume!(a != b);
        let x = split_whole_lines(&a);
        let y = split_whole_lines(&b);
        prop_assert!(!print_normal_diff(&x, &y).is_empty());
    }
}

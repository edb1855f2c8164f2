//! End-to-end tests of generated-code slot merging: parse a document,
//! extract its regions, apply generator results and compare the
//! re-serialized text.

use codeaug::ast::{stringify, AstBuilder};
use codeaug::markers::MarkerSet;
use codeaug::transform::{
    AstTransformer, AugCode, ContentPart, GenCodeMarkerType, GeneratedCode,
};
use rstest::rstest;

fn markers(list: &[&str]) -> MarkerSet {
    MarkerSet::compile(&list.iter().map(|m| m.to_string()).collect::<Vec<_>>())
}

fn builder() -> AstBuilder {
    AstBuilder {
        decorated_line_markers: markers(&["//:", "//_json:", "//|", "//.", "//^"]),
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
        gen_code_markers: markers(&["/*<", "//^"]),
        default_gen_code_inline_marker: Some("//^".into()),
        default_gen_code_start_marker: Some("/*<".into()),
        default_gen_code_end_marker: Some(">*/".into()),
        ..Default::default()
    }
}

/// Applies `gen_codes` to the first extracted region of `source` and
/// returns the resulting text.
fn merge(source: &str, gen_codes: Vec<Option<GeneratedCode>>) -> String {
    let t = transformer();
    let mut ast = builder().parse(source, "merge.txt").unwrap();
    let aug_codes = t.extract_aug_codes(&ast, 1).unwrap();
    assert!(!aug_codes.is_empty(), "no region found in source");
    t.apply_generated_codes(&mut ast, &aug_codes[0], &gen_codes)
        .unwrap();
    stringify(&ast)
}

fn extract_first(source: &str) -> AugCode {
    let ast = builder().parse(source, "merge.txt").unwrap();
    transformer().extract_aug_codes(&ast, 1).unwrap().remove(0)
}

const THREE_SLOTS: &str = "\
//aug<site
//:arg1
/*<
one
>*/
/*<
two
>*/
/*<
three
>*/
//aug>
";

#[test]
fn test_single_result_replaces_first_slot_and_deletes_rest() {
    let merged = merge(
        THREE_SLOTS,
        vec![Some(GeneratedCode::from_content("new one")), None],
    );
    assert_eq!(
        merged,
        "\
//aug<site
//:arg1
/*<
new one
>*/
//aug>
"
    );
}

#[test]
fn test_ignore_remainder_leaves_surplus_slots_untouched() {
    let mut gc = GeneratedCode::from_content("new one");
    gc.ignore_remainder = true;
    let merged = merge(THREE_SLOTS, vec![Some(gc), None]);
    assert_eq!(
        merged,
        "\
//aug<site
//:arg1
/*<
new one
>*/
/*<
two
>*/
/*<
three
>*/
//aug>
"
    );
}

#[test]
fn test_ignore_leaves_matched_slot_untouched() {
    let mut gc = GeneratedCode::from_content("never inserted");
    gc.ignore = true;
    gc.ignore_remainder = true;
    let merged = merge(THREE_SLOTS, vec![Some(gc), None]);
    assert_eq!(merged, THREE_SLOTS);
}

#[test]
fn test_results_appended_after_args_when_no_slots_exist() {
    let source = "\
//aug<site
//:arg1
inner
//aug>
trailer
";
    let merged = merge(
        source,
        vec![
            Some(GeneratedCode::from_content("alpha")),
            Some(GeneratedCode::from_content("beta")),
        ],
    );
    assert_eq!(
        merged,
        "\
//aug<site
//:arg1
/*<
alpha
>*/
inner
//aug>
/*<
beta
>*/
trailer
"
    );
}

#[test]
fn test_decorated_line_region_uses_only_last_result() {
    let source = "//.site\ntrailer\n";
    let merged = merge(
        source,
        vec![
            Some(GeneratedCode::from_content("dropped")),
            Some(GeneratedCode::from_content("kept")),
        ],
    );
    assert_eq!(merged, "//.site\n/*<\nkept\n>*/\ntrailer\n");
}

#[test]
fn test_empty_results_delete_existing_slot() {
    let source = "//.site\n/*<\nstale\n>*/\ntrailer\n";
    let merged = merge(source, vec![None]);
    assert_eq!(merged, "//.site\ntrailer\n");
}

#[rstest]
#[case(GenCodeMarkerType::Inline, "//.site\n//^hi\ntrailer\n")]
#[case(GenCodeMarkerType::EscapedBlock, "//.site\n/*<\nhi\n>*/\ntrailer\n")]
#[case(GenCodeMarkerType::PlainLines, "//.site\nhi\ntrailer\n")]
fn test_marker_type_controls_node_shape(
    #[case] marker_type: GenCodeMarkerType,
    #[case] expected: &str,
) {
    let mut gc = GeneratedCode::from_content("hi");
    gc.marker_type = marker_type;
    let merged = merge("//.site\ntrailer\n", vec![Some(gc)]);
    assert_eq!(merged, expected);
}

#[test]
fn test_replacement_reuses_slot_indent_and_terminator() {
    let source = "  //.site\r\n  //^old\r\n";
    let mut gc = GeneratedCode::from_content("new");
    gc.marker_type = GenCodeMarkerType::Inline;
    let merged = merge(source, vec![Some(gc)]);
    assert_eq!(merged, "  //.site\r\n  //^new\r\n");
}

#[test]
fn test_new_inline_node_uses_region_indent() {
    let source = "  //.site\n";
    let mut gc = GeneratedCode::from_content("fresh");
    gc.marker_type = GenCodeMarkerType::Inline;
    let merged = merge(source, vec![Some(gc)]);
    assert_eq!(merged, "  //.site\n  //^fresh\n");
}

#[test]
fn test_indented_content_parts() {
    let mut gc = GeneratedCode::from_content("a\nb");
    gc.indent = Some("    ".into());
    let merged = merge("//.site\n", vec![Some(gc)]);
    assert_eq!(merged, "//.site\n/*<\n    a\n    b\n>*/\n");
}

#[test]
fn test_exempt_parts_bypass_indent() {
    let mut gc = GeneratedCode {
        content_parts: vec![ContentPart::new("a\n"), ContentPart::exempt("raw\n")],
        ..Default::default()
    };
    gc.indent = Some("  ".into());
    let merged = merge("//.site\n", vec![Some(gc)]);
    assert_eq!(merged, "//.site\n/*<\n  a\nraw\n>*/\n");
}

#[test]
fn test_escaped_block_tag_uniquified_against_content() {
    // Content containing the end marker forces a tag suffix so the block
    // still parses as one unit.
    let gc = GeneratedCode::from_content(">*/\ndanger");
    let merged = merge("//.site\n", vec![Some(gc)]);
    assert_eq!(merged, "//.site\n/*<-1\n>*/\ndanger\n>*/-1\n");
    // The output must parse back to the same tree shape.
    let ast = builder().parse(&merged, "merge.txt").unwrap();
    assert_eq!(stringify(&ast), merged);
}

#[test]
fn test_region_descriptor_shape() {
    let aug = extract_first(THREE_SLOTS);
    assert!(aug.nested_block_used);
    assert_eq!(aug.line_number, 1);
    assert_eq!(aug.marker_aftermath, "site");
    assert_eq!(aug.args, vec![serde_json::json!("arg1")]);
}

#[test]
fn test_merge_is_idempotent_over_its_own_output() {
    let first = merge(THREE_SLOTS, vec![Some(GeneratedCode::from_content("x")), None]);
    let second = merge(&first, vec![Some(GeneratedCode::from_content("x")), None]);
    assert_eq!(second, first);
}

//! Round-trip fidelity: serialize(parse(t)) reproduces the source for every
//! supported construct, byte-for-byte where the markup attribute pins the
//! original form.

use markweave_engine::markdown::{parse, serialize};
use markweave_engine::schema::markdown_schema;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn roundtrip(text: &str) -> String {
    let schema = markdown_schema();
    let doc = parse(&schema, text);
    serialize(&schema, &doc).unwrap()
}

#[rstest]
#[case::strong_asterisks("**bold**\n")]
#[case::strong_underscores("__bold__\n")]
#[case::em_asterisk("*em*\n")]
#[case::em_underscore("_em_\n")]
#[case::mixed_emphasis("*em* and __bold__ prose\n")]
#[case::strike("~~gone~~\n")]
#[case::code_span("`code`\n")]
#[case::code_span_with_backtick("``a ` b``\n")]
fn inline_marks_keep_their_recorded_form(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[test]
fn bold_does_not_become_underscores() {
    assert_eq!(roundtrip("**bold**\n"), "**bold**\n");
    assert_ne!(roundtrip("**bold**\n"), "__bold__\n");
}

#[rstest]
#[case::atx_heading("# Heading\n\nparagraph after\n")]
#[case::deep_heading("###### Small\n")]
#[case::setext_h1("Title\n===\n")]
#[case::setext_h2("Subtitle\n---\n")]
#[case::blockquote("> quoted\n")]
#[case::blockquote_multi("> # Head\n>\n> body\n")]
#[case::thematic_break("first\n\n---\n\nsecond\n")]
fn block_structure_survives(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[rstest]
#[case::tight_dashes("- one\n- two\n")]
#[case::tight_stars("* starred\n* again\n")]
#[case::plus_bullets("+ plus\n")]
#[case::loose("- one\n\n- two\n")]
#[case::ordered("1. a\n2. b\n")]
#[case::ordered_paren_start("3) three\n4) four\n")]
#[case::ordered_repeat_idiom("1. a\n1. b\n1. c\n")]
#[case::nested("- outer\n  - inner\n")]
fn lists_keep_marker_start_and_spacing(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[test]
fn ordered_lists_are_renumbered_from_their_start() {
    // Source numbering is not copied verbatim: 5,9,2 renumbers from 5.
    assert_eq!(roundtrip("5. a\n9. b\n2. c\n"), "5. a\n6. b\n7. c\n");
}

#[rstest]
#[case::fenced("```\ncode here\n```\n")]
#[case::fenced_info("```rust\nfn main() {}\n```\n")]
#[case::tilde_fence("~~~\ncode\n~~~\n")]
#[case::indented("    indented code\n")]
fn code_blocks_keep_their_fence(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[rstest]
#[case::plain("| a | b |\n| --- | --- |\n| 1 | 2 |\n")]
#[case::aligned("| a | b | c |\n| :--- | :---: | ---: |\n| 1 | 2 | 3 |\n")]
fn tables_keep_alignment(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[rstest]
#[case::inline_link("[text](https://example.com)\n")]
#[case::titled_link("[t](https://example.com \"Title\")\n")]
#[case::autolink("<https://example.com>\n")]
#[case::image("![alt](img.png)\n")]
#[case::titled_image("![alt](img.png \"T\")\n")]
fn links_and_images_keep_their_form(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[test]
fn reference_links_round_trip_with_their_definitions() {
    let text = "[text][label]\n\n[label]: https://example.com\n";
    assert_eq!(roundtrip(text), text);
}

#[test]
fn reference_definitions_sort_numerically_then_by_name() {
    let text = "[a][10] [b][2] [c][beta]\n\n\
                [10]: https://ten.example\n\
                [2]: https://two.example\n\
                [beta]: https://beta.example\n";
    let expected = "[a][10] [b][2] [c][beta]\n\n\
                    [2]: https://two.example\n\
                    [10]: https://ten.example\n\
                    [beta]: https://beta.example\n";
    assert_eq!(roundtrip(text), expected);
}

#[rstest]
#[case::backslash_break("line\\\nnext\n")]
#[case::soft_break("one\ntwo\n")]
fn line_breaks_survive(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[test]
fn trailing_space_hard_break_survives() {
    assert_eq!(roundtrip("line  \nnext\n"), "line  \nnext\n");
}

#[rstest]
#[case::html_block("<div class=\"box\">\nraw\n</div>\n")]
#[case::html_inline("text <b>x</b> done\n")]
fn raw_html_is_preserved_verbatim(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[rstest]
#[case::escaped_star("\\*not emphasis\\*\n")]
#[case::escaped_heading("\\# not a heading\n")]
#[case::escaped_list_number("1\\. not a list\n")]
#[case::literal_brackets("\\[not a link\\]\n")]
fn ambiguous_literals_stay_escaped(#[case] text: &str) {
    assert_eq!(roundtrip(text), text);
}

#[test]
fn unresolved_reference_renders_as_literal_text() {
    assert_eq!(roundtrip("[text][nowhere]\n"), "\\[text\\]\\[nowhere\\]\n");
}

/// Reparsing serialized output always yields the same tree: the weaker
/// (semantic) half of the round-trip guarantee, checked over inputs whose
/// byte form the serializer is allowed to normalize.
#[rstest]
#[case::uneven_table("| a | b |\n| --- | --- |\n| only |\n")]
#[case::crowded_table("| a |\n| --- |\n| 1 | extra |\n")]
#[case::lazy_quote("> first\nlazy continuation\n")]
#[case::spaced_underline("Title\n=========\n")]
#[case::renumbered("7. x\n3. y\n")]
fn serialized_output_reparses_to_the_same_tree(#[case] text: &str) {
    let schema = markdown_schema();
    let once = parse(&schema, text);
    let emitted = serialize(&schema, &once).unwrap();
    let twice = parse(&schema, &emitted);
    assert_eq!(once, twice);
    // And the second pass is a fixed point.
    assert_eq!(serialize(&schema, &twice).unwrap(), emitted);
}

#[test]
fn intra_word_underscores_are_not_escaped() {
    assert_eq!(roundtrip("snake_case_name here\n"), "snake_case_name here\n");
}

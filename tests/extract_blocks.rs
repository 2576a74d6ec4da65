// tests/extract_blocks.rs
//
// Display-block rendering: totality, emphasis edge cases and stability.

use rand::{rngs::StdRng, Rng, SeedableRng};

use global_pulse::extract::{render_blocks, DisplayBlock, InlineSpan};

const ALPHABET: &[&str] = &[
    "#", "### ", "*", "**", "- ", "* ", " ", "\n", "\r\n", "(Heat: ", ")", "9", "新闻", "a",
    "\t", "(Heat: 4294967296)",
];

fn random_text(rng: &mut StdRng) -> String {
    let len = rng.random_range(0..40);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
        .collect()
}

#[test]
fn every_input_yields_one_block_per_line() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1_000 {
        let text = random_text(&mut rng);
        let blocks = render_blocks(&text);
        assert_eq!(blocks.len(), text.split('\n').count(), "input {text:?}");
    }
}

#[test]
fn empty_input_is_a_single_spacer() {
    assert_eq!(render_blocks(""), vec![DisplayBlock::Spacer]);
}

#[test]
fn rendering_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let text = random_text(&mut rng);
        assert_eq!(render_blocks(&text), render_blocks(&text));
    }
}

#[test]
fn stray_strong_marker_stays_literal() {
    let blocks = render_blocks("Markets **rally on data");
    assert_eq!(
        blocks,
        vec![DisplayBlock::Paragraph {
            text: "Markets **rally on data".into(),
            spans: vec![InlineSpan::Text("Markets **rally on data".into())],
        }]
    );
}

#[test]
fn list_items_carry_strong_spans() {
    let blocks = render_blocks("- **Fed** holds rates\n  * indented **two** items **");
    assert_eq!(
        blocks[0],
        DisplayBlock::ListItem {
            text: "**Fed** holds rates".into(),
            spans: vec![
                InlineSpan::Strong("Fed".into()),
                InlineSpan::Text(" holds rates".into()),
            ],
        }
    );
    match &blocks[1] {
        DisplayBlock::ListItem { spans, .. } => assert_eq!(
            spans,
            &vec![
                InlineSpan::Text("indented ".into()),
                InlineSpan::Strong("two".into()),
                InlineSpan::Text(" items **".into()),
            ]
        ),
        other => panic!("expected list item, got {other:?}"),
    }
}

#[test]
fn overflowing_heat_is_a_plain_heading() {
    let blocks = render_blocks("### Huge (Heat: 4294967296)");
    assert_eq!(
        blocks,
        vec![DisplayBlock::Heading {
            text: "Huge (Heat: 4294967296)".into(),
            heat: None,
        }]
    );
}

#[test]
fn blocks_serialize_with_type_tags() {
    let json = serde_json::to_value(render_blocks("### T (Heat: 5)\n\nbody")).unwrap();
    assert_eq!(json[0]["type"], "heading");
    assert_eq!(json[0]["heat"], 5);
    assert_eq!(json[1]["type"], "spacer");
    assert_eq!(json[2]["type"], "paragraph");
    assert_eq!(json[2]["spans"][0]["kind"], "text");
}

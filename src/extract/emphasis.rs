// src/extract/emphasis.rs
//! Inline pass: tags `**strong**` spans inside list items and paragraphs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Non-greedy so `**a** and **b**` yields two spans, not one.
static STRONG_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(?P<inner>.*?)\*\*").expect("strong span regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum InlineSpan {
    Text(String),
    Strong(String),
}

/// Splits `text` into plain and strong spans. Unpaired `**` stays literal.
pub fn parse_emphasis(text: &str) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for caps in STRONG_SPAN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            spans.push(InlineSpan::Text(text[cursor..whole.start()].to_string()));
        }
        let inner = caps.name("inner").map_or("", |m| m.as_str());
        spans.push(InlineSpan::Strong(inner.to_string()));
        cursor = whole.end();
    }
    if cursor < text.len() {
        spans.push(InlineSpan::Text(text[cursor..].to_string()));
    }
    spans
}

// src/extract/heat.rs
//! Heading pass: recognizes `### Title (Heat: 87)` lines.

use once_cell::sync::Lazy;
use regex::Regex;

/// Line prefix that marks a section heading in generated digests.
pub const HEADING_MARKER: &str = "### ";

// ` (Heat: <digits>)`. The title is everything before the first one; the heat is
// the first one whose digits fit in u32. Anything after it is ignored.
static HEAT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" \(Heat: (?P<heat>\d+)\)").expect("heat regex"));

/// A heading line split into its title and optional heat score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingLine<'a> {
    /// Title as written (untrimmed when a heat suffix was found).
    pub title: &'a str,
    pub heat: Option<u32>,
}

/// Returns `None` when `line` is not a heading. Malformed or absent heat yields `heat: None`.
pub fn parse_heading(line: &str) -> Option<HeadingLine<'_>> {
    let content = line.strip_prefix(HEADING_MARKER)?;
    Some(parse_heat(content))
}

/// Splits heading content (marker already removed) into title and heat.
pub fn parse_heat(content: &str) -> HeadingLine<'_> {
    let mut title_end = None;
    for caps in HEAT_SUFFIX.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        let end = *title_end.get_or_insert(whole.start());
        if let Some(heat) = caps.name("heat").and_then(|m| m.as_str().parse::<u32>().ok()) {
            return HeadingLine {
                title: &content[..end],
                heat: Some(heat),
            };
        }
    }
    // no marker, or only markers whose digits overflow u32
    HeadingLine {
        title: content,
        heat: None,
    }
}

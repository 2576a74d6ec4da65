// src/extract/mod.rs
//! Digest extraction: turns generated markdown-ish text into display blocks,
//! first-seen headlines and a ranked heat series for charts.
//!
//! Two independent passes feed this module:
//! - [`heat`] recognizes heading lines and their `(Heat: N)` score;
//! - [`emphasis`] tags `**strong**` spans inside body text.
//!
//! Every function here is total and pure: any input string produces a valid result.

pub mod emphasis;
pub mod heat;

use serde::{Deserialize, Serialize};

pub use emphasis::{parse_emphasis, InlineSpan};
pub use heat::{parse_heading, HeadingLine, HEADING_MARKER};

/// Upper bound on chart entries.
pub const CHART_CAP: usize = 15;
/// Chart labels longer than this (in code points) are cut.
pub const LABEL_MAX_CHARS: usize = 8;
pub const LABEL_ELLIPSIS: &str = "..";

const LIST_MARKERS: [&str; 2] = ["* ", "- "];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayBlock {
    Heading { text: String, heat: Option<u32> },
    ListItem { text: String, spans: Vec<InlineSpan> },
    Paragraph { text: String, spans: Vec<InlineSpan> },
    Spacer,
}

/// One ranked point of the heat chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    /// Display label, cut to [`LABEL_MAX_CHARS`] plus [`LABEL_ELLIPSIS`].
    pub name: String,
    pub score: u32,
}

/// A heat-annotated heading in the order it appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub heat: u32,
}

fn lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Classifies each line into a [`DisplayBlock`].
pub fn render_blocks(raw: &str) -> Vec<DisplayBlock> {
    lines(raw).map(classify_line).collect()
}

fn classify_line(line: &str) -> DisplayBlock {
    if let Some(h) = parse_heading(line) {
        return DisplayBlock::Heading {
            text: h.title.trim().to_string(),
            heat: h.heat,
        };
    }

    let trimmed = line.trim();
    if let Some(rest) = LIST_MARKERS.iter().find_map(|m| trimmed.strip_prefix(*m)) {
        return DisplayBlock::ListItem {
            text: rest.to_string(),
            spans: parse_emphasis(rest),
        };
    }

    if trimmed.is_empty() {
        return DisplayBlock::Spacer;
    }

    DisplayBlock::Paragraph {
        text: trimmed.to_string(),
        spans: parse_emphasis(trimmed),
    }
}

/// Heat-annotated headings in first-seen order (titles trimmed, untruncated).
pub fn extract_headlines(raw: &str) -> Vec<Headline> {
    lines(raw)
        .filter_map(parse_heading)
        .filter_map(|h| {
            let title = h.title.trim();
            match h.heat {
                Some(heat) if !title.is_empty() => Some(Headline {
                    title: title.to_string(),
                    heat,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Ranked chart series: score descending (ties keep first-seen order), at most [`CHART_CAP`].
pub fn extract_chart_series(raw: &str) -> Vec<ChartEntry> {
    chart_from_headlines(&extract_headlines(raw))
}

pub fn chart_from_headlines(headlines: &[Headline]) -> Vec<ChartEntry> {
    let mut series: Vec<ChartEntry> = headlines
        .iter()
        .map(|h| ChartEntry {
            name: truncate_label(&h.title),
            score: h.heat,
        })
        .collect();
    // stable sort
    series.sort_by(|a, b| b.score.cmp(&a.score));
    series.truncate(CHART_CAP);
    series
}

/// Cuts `title` to [`LABEL_MAX_CHARS`] code points, appending [`LABEL_ELLIPSIS`] when cut.
pub fn truncate_label(title: &str) -> String {
    if title.chars().count() <= LABEL_MAX_CHARS {
        return title.to_string();
    }
    let mut out: String = title.chars().take(LABEL_MAX_CHARS).collect();
    out.push_str(LABEL_ELLIPSIS);
    out
}

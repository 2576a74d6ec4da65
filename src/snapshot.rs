// src/snapshot.rs
//! Standalone HTML export of a cached digest.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::digest::CachedDigest;
use crate::extract::{DisplayBlock, InlineSpan, CHART_CAP};
use crate::region::Region;
use crate::schedule::RefreshPolicy;

/// Bar colours from hottest to coolest rank.
pub const RANK_COLORS: [&str; 6] = [
    "#ef4444", "#f97316", "#eab308", "#10b981", "#06b6d4", "#3b82f6",
];

const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons?domain=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub background: String,
    /// Never emit `<img>` pointing at third-party hosts.
    pub exclude_external_images: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            background: "#0f172a".to_string(),
            exclude_external_images: true,
        }
    }
}

pub fn snapshot_filename(region: Region, date: NaiveDate) -> String {
    format!("global-pulse-{}-{}.html", region.as_str(), date.format("%Y-%m-%d"))
}

/// Filename for `digest`, dated by the policy's civil calendar.
pub fn snapshot_filename_for(digest: &CachedDigest, policy: &RefreshPolicy) -> String {
    snapshot_filename(digest.region, policy.civil(digest.generated_at).date_naive())
}

/// Colour for the bar at zero-based `rank`.
pub fn rank_color(rank: usize) -> &'static str {
    let idx = rank * RANK_COLORS.len() / CHART_CAP;
    RANK_COLORS[idx.min(RANK_COLORS.len() - 1)]
}

pub fn render_html(
    digest: &CachedDigest,
    opts: &SnapshotOptions,
    next_refresh: DateTime<Utc>,
) -> String {
    let region = digest.region;
    let mut out = String::with_capacity(digest.markdown.len() * 2 + 2048);

    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"zh\">\n<head>\n<meta charset=\"utf-8\">\n<title>{} · {}</title>\n</head>\n",
        encode_text(region.label()),
        encode_text(region.as_str()),
    );
    let _ = write!(
        out,
        "<body style=\"background:{};color:#e2e8f0;font-family:sans-serif;padding:24px\">\n",
        encode_double_quoted_attribute(&opts.background),
    );
    let _ = write!(
        out,
        "<header>\n<h1>{}</h1>\n<p>{}</p>\n<p>generated {} · next refresh {}</p>\n</header>\n",
        encode_text(region.label()),
        encode_text(region.description()),
        digest.generated_at.to_rfc3339(),
        next_refresh.to_rfc3339(),
    );

    write_chart(&mut out, digest);
    write_blocks(&mut out, &digest.blocks());
    write_sources(&mut out, digest, opts);

    out.push_str("</body>\n</html>\n");
    out
}

fn write_chart(out: &mut String, digest: &CachedDigest) {
    if digest.chart_series.is_empty() {
        return;
    }
    out.push_str("<section class=\"chart\">\n");
    for (rank, entry) in digest.chart_series.iter().enumerate() {
        let width = entry.score.min(100);
        let _ = writeln!(
            out,
            "<div class=\"bar\"><span>{}</span><div style=\"width:{}%;background:{}\">{}</div></div>",
            encode_text(&entry.name),
            width,
            rank_color(rank),
            entry.score,
        );
    }
    out.push_str("</section>\n");
}

fn write_spans(out: &mut String, spans: &[InlineSpan]) {
    for span in spans {
        match span {
            InlineSpan::Text(t) => out.push_str(&encode_text(t)),
            InlineSpan::Strong(t) => {
                let _ = write!(out, "<strong>{}</strong>", encode_text(t));
            }
        }
    }
}

fn write_blocks(out: &mut String, blocks: &[DisplayBlock]) {
    out.push_str("<article>\n");
    for block in blocks {
        match block {
            DisplayBlock::Heading { text, heat } => {
                let _ = write!(out, "<h3>{}", encode_text(text));
                if let Some(h) = heat {
                    let _ = write!(out, " <span class=\"heat\">{h}</span>");
                }
                out.push_str("</h3>\n");
            }
            DisplayBlock::ListItem { spans, .. } => {
                out.push_str("<li>");
                write_spans(out, spans);
                out.push_str("</li>\n");
            }
            DisplayBlock::Paragraph { spans, .. } => {
                out.push_str("<p>");
                write_spans(out, spans);
                out.push_str("</p>\n");
            }
            DisplayBlock::Spacer => out.push_str("<br>\n"),
        }
    }
    out.push_str("</article>\n");
}

fn write_sources(out: &mut String, digest: &CachedDigest, opts: &SnapshotOptions) {
    if digest.sources.is_empty() {
        return;
    }
    out.push_str("<footer>\n<ul class=\"sources\">\n");
    for src in &digest.sources {
        let host = src.display_host().unwrap_or_else(|| src.uri.clone());
        out.push_str("<li>");
        if !opts.exclude_external_images {
            let _ = write!(
                out,
                "<img src=\"{}{}\" alt=\"\" width=\"16\" height=\"16\"> ",
                FAVICON_SERVICE,
                encode_double_quoted_attribute(&host),
            );
        }
        let _ = writeln!(
            out,
            "<a href=\"{}\">{}</a> <small>{}</small></li>",
            encode_double_quoted_attribute(&src.uri),
            encode_text(&src.title),
            encode_text(&host),
        );
    }
    out.push_str("</ul>\n</footer>\n");
}

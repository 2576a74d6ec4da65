// src/digest.rs
//! The cached digest record and the wire shapes derived from it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::{self, ChartEntry, Headline};
use crate::region::Region;

/// Most citations kept per digest.
pub const MAX_SOURCES: usize = 30;
pub const UNKNOWN_SOURCE_TITLE: &str = "未知来源";
/// Substituted when the provider answers without any text.
pub const EMPTY_CONTENT: &str = "未生成内容。";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub title: String,
    pub uri: String,
}

impl SourceCitation {
    /// Hostname without a leading `www.`, if the uri parses.
    pub fn display_host(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.uri).ok()?;
        let host = parsed.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_string())
    }
}

/// Grounding chunk as returned by the provider, before cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCitation {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// Drops uri-less chunks, fills missing titles, dedups by uri (first seen wins), caps at [`MAX_SOURCES`].
pub fn normalize_citations(raw: impl IntoIterator<Item = RawCitation>) -> Vec<SourceCitation> {
    let mut seen: HashSet<String> = HashSet::new();
    raw.into_iter()
        .filter_map(|c| {
            let uri = c.uri.map(|u| u.trim().to_string()).filter(|u| !u.is_empty() && u != "#")?;
            let title = c
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNKNOWN_SOURCE_TITLE.to_string());
            Some(SourceCitation { title, uri })
        })
        .filter(|c| seen.insert(c.uri.clone()))
        .take(MAX_SOURCES)
        .collect()
}

/// One successful fetch. Replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDigest {
    pub region: Region,
    /// When the fetch completed.
    pub generated_at: DateTime<Utc>,
    pub markdown: String,
    pub sources: Vec<SourceCitation>,
    pub chart_series: Vec<ChartEntry>,
    /// Short SHA-256 of `markdown`.
    pub fingerprint: String,
}

impl CachedDigest {
    pub fn new(
        region: Region,
        generated_at: DateTime<Utc>,
        text: Option<String>,
        citations: Vec<RawCitation>,
    ) -> Self {
        let markdown = text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| EMPTY_CONTENT.to_string());
        let chart_series = extract::extract_chart_series(&markdown);
        let fingerprint = fingerprint(&markdown);
        Self {
            region,
            generated_at,
            markdown,
            sources: normalize_citations(citations),
            chart_series,
            fingerprint,
        }
    }

    /// Rebuilds every derived field (chart series, fingerprint, source cleanup)
    /// from `markdown` and `sources`. Used on records read back from disk.
    pub fn rederive(self) -> Self {
        let citations = self
            .sources
            .into_iter()
            .map(|c| RawCitation {
                title: Some(c.title),
                uri: Some(c.uri),
            })
            .collect();
        Self::new(self.region, self.generated_at, Some(self.markdown), citations)
    }

    pub fn headlines(&self) -> Vec<Headline> {
        extract::extract_headlines(&self.markdown)
    }

    pub fn blocks(&self) -> Vec<extract::DisplayBlock> {
        extract::render_blocks(&self.markdown)
    }
}

pub fn fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// JSON body of `GET /api/news`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestResponse {
    pub region: Region,
    pub markdown: String,
    pub sources: Vec<SourceCitation>,
    pub chart_data: Vec<ChartEntry>,
    pub headlines: Vec<Headline>,
    pub generated_at: DateTime<Utc>,
    pub next_refresh_at: DateTime<Utc>,
}

impl DigestResponse {
    pub fn from_digest(d: &CachedDigest, next_refresh_at: DateTime<Utc>) -> Self {
        Self {
            region: d.region,
            markdown: d.markdown.clone(),
            sources: d.sources.clone(),
            chart_data: d.chart_series.clone(),
            headlines: d.headlines(),
            generated_at: d.generated_at,
            next_refresh_at,
        }
    }
}

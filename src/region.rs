// src/region.rs
//! Digest categories ("regions") and the editor prompt sent for each.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DigestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    Global,
    China,
    Tech,
    Finance,
    Sports,
}

pub const ALL_REGIONS: [Region; 5] = [
    Region::Global,
    Region::China,
    Region::Tech,
    Region::Finance,
    Region::Sports,
];

/// Items the editor prompt asks for.
pub const DIGEST_ITEMS: usize = 25;

pub const SYSTEM_INSTRUCTION: &str = "你是一个专业的全球新闻聚合助手。你必须使用 Google Search 获取最新信息，始终用中文回答，并严格遵循格式要求输出25条内容。";

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Global => "Global",
            Region::China => "China",
            Region::Tech => "Tech",
            Region::Finance => "Finance",
            Region::Sports => "Sports",
        }
    }

    /// Chinese display label.
    pub fn label(&self) -> &'static str {
        match self {
            Region::Global => "全球热搜",
            Region::China => "中国大陆",
            Region::Tech => "科技前沿",
            Region::Finance => "财经动态",
            Region::Sports => "体育赛事",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Region::Global => "Global Trends",
            Region::China => "Mainland China",
            Region::Tech => "Technology",
            Region::Finance => "Markets",
            Region::Sports => "Sports",
        }
    }

    /// What the model should search for.
    pub fn search_context(&self) -> &'static str {
        match self {
            Region::Global => "全球范围内的热门新闻和重大时事",
            Region::China => "中国（含港澳台）的实时热搜和重大新闻",
            Region::Tech => "全球科技界的热门新闻和突破性进展",
            Region::Finance => "全球金融市场和经济领域的热点新闻",
            Region::Sports => "全球体育界的重大赛事和热点新闻",
        }
    }

    /// Editor prompt. The `### [title] (Heat: [score])` shape is what the extractor parses.
    pub fn prompt(&self) -> String {
        format!(
            "扮演一位资深的新闻主编。请利用 Google Search 搜索当前的{context}。\n\
             \n\
             请用**中文（简体）**回答。我需要你按照特定的格式生成回复，并为前 **{n}** 条最重要的新闻打一个“热度分”（Trending Heat，范围 0-100）。\n\
             \n\
             每一条新闻的格式必须严格遵守如下结构（请保留 Heat: 这个英文标记以便我解析）：\n\
             \n\
             ### [新闻标题] (Heat: [分数])\n\
             [一段简明扼要的新闻摘要，约2-3句话。请使用 Markdown 加粗功能突出关键人物、地点或事件。]\n\
             \n\
             **重要要求**：\n\
             1. 必须列出 **至少 {n} 条** 新闻。\n\
             2. 涉及中国的内容请务必客观、准确。\n\
             3. 热度分（Heat）应反映该事件在全球或该领域的讨论热度。\n\
             4. 确保内容是即时的（Last 24 hours preferred）。\n",
            context = self.search_context(),
            n = DIGEST_ITEMS,
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = DigestError;

    /// Case-insensitive; empty input means the default region.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() {
            return Ok(Region::default());
        }
        ALL_REGIONS
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| DigestError::InvalidRegion(t.to_string()))
    }
}

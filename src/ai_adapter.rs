// src/ai_adapter.rs
//! AI adapter: provider abstraction for the generative-language API.
//!
//! The provider is an opaque collaborator: a request goes in, free-form text
//! plus optional grounding citations come out. Parsing that text is the
//! extractor's job, not the provider's.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, ProviderKind};
use crate::digest::RawCitation;
use crate::error::DigestError;
use crate::region::{Region, SYSTEM_INSTRUCTION};

/// Env switch shared with the test-suite: `mock` or `error`.
pub const ENV_AI_TEST_MODE: &str = "AI_TEST_MODE";

/// What we ask the model for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: String,
    pub web_search: bool,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn for_region(region: Region, cfg: &ProviderConfig) -> Self {
        Self {
            prompt: region.prompt(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            web_search: cfg.web_search,
            temperature: cfg.temperature,
        }
    }
}

/// What the model gave back. `text: None` means "empty content", not a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: Option<String>,
    pub citations: Vec<RawCitation>,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(&self, req: &GenerationRequest) -> Result<Generation, DigestError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynProvider = Arc<dyn TextProvider>;

/// Factory: build a provider according to config and environment.
///
/// * `AI_TEST_MODE=mock` returns the canned [`MockProvider`].
/// * `AI_TEST_MODE=error` returns a mock that always fails upstream.
/// * Otherwise `cfg.kind` decides.
pub fn build_provider(cfg: &ProviderConfig) -> Result<DynProvider, DigestError> {
    match std::env::var(ENV_AI_TEST_MODE).ok().as_deref() {
        Some("mock") => return Ok(Arc::new(MockProvider::new())),
        Some("error") => {
            return Ok(Arc::new(MockProvider::new().failing(DigestError::upstream(
                Some(503),
                "mock provider error",
            ))))
        }
        _ => {}
    }
    match cfg.kind {
        ProviderKind::Mock => Ok(Arc::new(MockProvider::new())),
        ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::new(cfg)?)),
    }
}

// ------------------------------------------------------------
// Gemini (generateContent REST API)
// ------------------------------------------------------------

pub struct GeminiProvider {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiProvider {
    pub fn new(cfg: &ProviderConfig) -> Result<Self, DigestError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("global-pulse/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| DigestError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key: cfg.resolve_api_key(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenConfig,
    system_instruction: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct GenConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<RespContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Debug, Default, Deserialize)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<RawCitation>,
}

fn build_body(req: &GenerationRequest) -> GeminiReq<'_> {
    GeminiReq {
        contents: vec![Content {
            parts: vec![Part { text: &req.prompt }],
        }],
        tools: if req.web_search {
            vec![Tool {
                google_search: serde_json::Map::new(),
            }]
        } else {
            Vec::new()
        },
        generation_config: GenConfig {
            temperature: req.temperature,
        },
        system_instruction: Content {
            parts: vec![Part {
                text: &req.system_instruction,
            }],
        },
    }
}

/// Decodes a generateContent body into text + citations.
pub fn parse_gemini_body(body: &str) -> Result<Generation, DigestError> {
    let resp: GeminiResp =
        serde_json::from_str(body).map_err(|e| DigestError::Parse(e.to_string()))?;
    let Some(first) = resp.candidates.into_iter().next() else {
        return Ok(Generation::default());
    };
    let text: String = first
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let citations = first
        .grounding_metadata
        .map(|g| g.grounding_chunks.into_iter().filter_map(|c| c.web).collect())
        .unwrap_or_default();
    Ok(Generation {
        text: Some(text).filter(|t| !t.trim().is_empty()),
        citations,
    })
}

#[async_trait]
impl TextProvider for GeminiProvider {
    async fn generate(&self, req: &GenerationRequest) -> Result<Generation, DigestError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DigestError::Configuration("API_KEY missing".to_string()))?;

        let resp = self
            .http
            .post(self.url())
            .query(&[("key", key)])
            .json(&build_body(req))
            .send()
            .await
            .map_err(|e| DigestError::upstream(None, e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DigestError::upstream(Some(status.as_u16()), e.without_url().to_string()))?;

        if !status.is_success() {
            tracing::warn!(target: "provider", status = status.as_u16(), "generateContent failed");
            return Err(DigestError::upstream(Some(status.as_u16()), body));
        }
        parse_gemini_body(&body)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// Mock provider (tests and local runs)
// ------------------------------------------------------------

pub const MOCK_DIGEST: &str = "### 全球股市集体上涨 (Heat: 92)\n\
**纽约**、**伦敦**与**东京**股市同步走高，投资者押注降息。\n\
\n\
### 新一代AI芯片发布会引发关注 (Heat: 88)\n\
多家厂商发布新品，**算力**竞争加剧。\n\
\n\
### 欧洲杯预选赛 (Heat: 61)\n\
- 小组赛进入**关键阶段**\n\
\n\
### 气候峰会达成初步共识 (Heat: 75)\n\
各国承诺加快减排。\n";

/// Deterministic provider: canned text, records prompts, can be made to fail or lag.
pub struct MockProvider {
    text: Option<String>,
    citations: Vec<RawCitation>,
    failure: Option<DigestError>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            text: Some(MOCK_DIGEST.to_string()),
            citations: vec![
                RawCitation {
                    title: Some("Reuters".into()),
                    uri: Some("https://www.reuters.com/markets/".into()),
                },
                RawCitation {
                    title: None,
                    uri: Some("https://news.example.org/ai-chips".into()),
                },
            ],
            failure: None,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(mut self, text: Option<&str>) -> Self {
        self.text = text.map(str::to_string);
        self
    }

    pub fn with_citations(mut self, citations: Vec<RawCitation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn failing(mut self, err: DigestError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|g| g.len()).unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    async fn generate(&self, req: &GenerationRequest) -> Result<Generation, DigestError> {
        if let Ok(mut g) = self.prompts.lock() {
            g.push(req.prompt.clone());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(Generation {
            text: self.text.clone(),
            citations: self.citations.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_has_search_tool_and_system_instruction() {
        let req = GenerationRequest::for_region(Region::Tech, &ProviderConfig::default());
        let v = serde_json::to_value(build_body(&req)).unwrap();
        assert_eq!(v["tools"][0]["googleSearch"], serde_json::json!({}));
        assert!((v["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(
            v["systemInstruction"]["parts"][0]["text"],
            serde_json::json!(SYSTEM_INSTRUCTION)
        );
        assert!(v["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains(Region::Tech.search_context()));
    }

    #[test]
    fn search_tool_omitted_when_disabled() {
        let mut req = GenerationRequest::for_region(Region::Global, &ProviderConfig::default());
        req.web_search = false;
        let v = serde_json::to_value(build_body(&req)).unwrap();
        assert!(v.get("tools").is_none());
    }

    #[test]
    fn parses_text_parts_and_grounding_chunks() {
        let body = r####"{
          "candidates": [{
            "content": {"parts": [{"text": "### A (Heat: 1)\n"}, {"text": "body"}]},
            "groundingMetadata": {"groundingChunks": [
              {"web": {"uri": "https://a.example", "title": "A"}},
              {"retrievedContext": {}}
            ]}
          }]
        }"####;
        let g = parse_gemini_body(body).unwrap();
        assert_eq!(g.text.as_deref(), Some("### A (Heat: 1)\nbody"));
        assert_eq!(g.citations.len(), 1);
        assert_eq!(g.citations[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn no_candidates_is_empty_content_not_error() {
        let g = parse_gemini_body(r#"{"candidates": []}"#).unwrap();
        assert_eq!(g.text, None);
        let g = parse_gemini_body(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert_eq!(g.text, None);
    }

    #[test]
    fn garbage_body_is_parse_error() {
        assert!(matches!(
            parse_gemini_body("<html>oops</html>"),
            Err(DigestError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let cfg = ProviderConfig {
            api_key: String::new(),
            ..ProviderConfig::default()
        };
        let p = GeminiProvider::new(&cfg).unwrap();
        let req = GenerationRequest::for_region(Region::Global, &cfg);
        assert!(matches!(
            p.generate(&req).await,
            Err(DigestError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn mock_records_prompts() {
        let m = MockProvider::new();
        let req = GenerationRequest::for_region(Region::Finance, &ProviderConfig::default());
        let g = m.generate(&req).await.unwrap();
        assert!(g.text.unwrap().contains("(Heat: 92)"));
        assert_eq!(m.calls(), 1);
        assert!(m.prompts()[0].contains(Region::Finance.search_context()));
    }
}

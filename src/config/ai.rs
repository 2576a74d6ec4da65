// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

/// Env vars consulted when `api_key = "ENV"`, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_web_search() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    90
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// "ENV" means: read from API_KEY / GEMINI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Ask the model to ground its answer with web search.
    #[serde(default = "default_web_search")]
    pub web_search: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            web_search: default_web_search(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Resolved credential, or `None` when nothing usable is configured.
    pub fn resolve_api_key(&self) -> Option<String> {
        let raw = self.api_key.trim();
        if raw.eq_ignore_ascii_case("env") {
            return API_KEY_ENV_VARS
                .iter()
                .filter_map(|k| env::var(k).ok())
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty());
        }
        Some(raw.to_string()).filter(|k| !k.is_empty())
    }

    /// Keep the temperature inside the API's accepted range.
    pub(crate) fn sanitize(&mut self) {
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
    }
}

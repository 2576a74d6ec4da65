// src/config/mod.rs
//! Service configuration: `config/pulse.toml` plus env overrides.
//!
//! Resolution order:
//! 1) `$PULSE_CONFIG_PATH`, else `config/pulse.toml` (a missing file means defaults);
//! 2) env overrides `PULSE_RESET_HOUR`, `PULSE_TZ_OFFSET_MINUTES`, `PULSE_CACHE_DIR`, `PULSE_MODEL`.

pub mod ai;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use ai::{ProviderConfig, ProviderKind};

use crate::schedule::RefreshPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/pulse.toml";
pub const ENV_CONFIG_PATH: &str = "PULSE_CONFIG_PATH";
pub const ENV_RESET_HOUR: &str = "PULSE_RESET_HOUR";
pub const ENV_TZ_OFFSET_MINUTES: &str = "PULSE_TZ_OFFSET_MINUTES";
pub const ENV_CACHE_DIR: &str = "PULSE_CACHE_DIR";
pub const ENV_MODEL: &str = "PULSE_MODEL";

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/digest")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub refresh: RefreshPolicy,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl PulseConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: PulseConfig = toml::from_str(s).context("parsing pulse config")?;
        cfg.provider.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pulse config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Config file (if any) + env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from(Path::new(&p))?,
            Err(_) => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from(p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let hour = env_parse::<u32>(ENV_RESET_HOUR)?;
        let offset = env_parse::<i32>(ENV_TZ_OFFSET_MINUTES)?;
        if hour.is_some() || offset.is_some() {
            self.refresh = RefreshPolicy::new(
                hour.unwrap_or(self.refresh.daily_reset_hour()),
                offset.unwrap_or(self.refresh.timezone_offset_minutes()),
            )?;
        }
        if let Some(dir) = env_nonempty(ENV_CACHE_DIR) {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(model) = env_nonempty(ENV_MODEL) {
            self.provider.model = model;
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_nonempty(key) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {v}")),
    }
}

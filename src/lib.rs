// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod ai_adapter;
pub mod api;
pub mod config;
pub mod digest;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod region;
pub mod schedule;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::digest::{CachedDigest, DigestResponse};
pub use crate::error::DigestError;
pub use crate::region::Region;
pub use crate::schedule::{is_valid, next_refresh_instant, until_next_refresh, RefreshPolicy};
pub use crate::service::{CacheStatus, DigestService};

use anyhow::Context;
use shuttle_axum::axum::Router;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "PULSE_LOG_FORMAT";

/// Install the fmt subscriber (`RUST_LOG`, JSON when `PULSE_LOG_FORMAT=json`).
/// A subscriber installed earlier (e.g. by the host runtime) wins.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("global_pulse=info,warn"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Build the Router the binary serves, from `config/pulse.toml` and env.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = config::PulseConfig::load().context("loading pulse config")?;
    let state = AppState::from_config(&cfg).context("building app state")?;
    Ok(router(state))
}

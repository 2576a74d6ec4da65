//! Global Pulse digest service: binary entrypoint.
//! Boots the Axum HTTP server with the digest service, session timer and CORS.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use global_pulse::config::PulseConfig;
use global_pulse::metrics::Metrics;
use global_pulse::{router, AppState, Region};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    global_pulse::init_tracing();
    // Recorder is process-wide; `/metrics` is only routed with DEBUG_ROUTES=1.
    let _ = Metrics::init();

    let cfg = PulseConfig::load().context("loading pulse config")?;
    tracing::info!(
        provider = ?cfg.provider.kind,
        model = %cfg.provider.model,
        reset_hour = cfg.refresh.daily_reset_hour(),
        tz_offset_min = cfg.refresh.timezone_offset_minutes(),
        cache_dir = %cfg.cache.dir.display(),
        "config loaded"
    );

    let state = AppState::from_config(&cfg).context("building app state")?;

    // The default session starts on the global view, with its timer armed.
    state.session.lock().await.activate(Region::default());
    let service = state.service.clone();
    tokio::spawn(async move {
        if let Err(e) = service.digest(Region::default(), false).await {
            tracing::warn!(target: "digest", "startup warm-up failed: {e}");
        }
    });

    Ok(router(state).into())
}

// src/api.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use chrono::{DateTime, Utc};

use crate::ai_adapter::build_provider;
use crate::config::PulseConfig;
use crate::digest::{CachedDigest, DigestResponse};
use crate::error::DigestError;
use crate::extract::DisplayBlock;
use crate::metrics::Metrics;
use crate::region::Region;
use crate::service::{CacheStatus, DigestService};
use crate::session::SessionController;
use crate::snapshot::{self, SnapshotOptions};
use crate::store::FileStore;

pub const HEADER_DIGEST_CACHE: &str = "x-digest-cache";
pub const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DigestService>,
    pub session: Arc<Mutex<SessionController>>,
    pub snapshot: SnapshotOptions,
}

impl AppState {
    pub fn new(service: Arc<DigestService>) -> Self {
        let session = SessionController::new(service.clone());
        Self {
            service,
            session: Arc::new(Mutex::new(session)),
            snapshot: SnapshotOptions::default(),
        }
    }

    /// Provider from config (or `AI_TEST_MODE`), file-backed cache.
    pub fn from_config(cfg: &PulseConfig) -> Result<Self, DigestError> {
        let provider = build_provider(&cfg.provider)?;
        let store = Arc::new(FileStore::new(cfg.cache.dir.clone()));
        let service = DigestService::new(provider, store, cfg.refresh, cfg.provider.clone());
        Ok(Self::new(Arc::new(service)))
    }
}

fn debug_routes_enabled() -> bool {
    std::env::var(ENV_DEBUG_ROUTES)
        .map(|v| v.trim() == "1")
        .unwrap_or(false)
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(get_news).options(preflight))
        .route("/api/news/blocks", get(get_blocks))
        .route("/api/news/snapshot", get(get_snapshot))
        .route("/api/schedule", get(get_schedule))
        .with_state(state);

    if debug_routes_enabled() {
        if let Some(m) = Metrics::init() {
            app = app.merge(m.router());
        }
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

impl NewsQuery {
    fn region(&self) -> Result<Region, DigestError> {
        self.region.as_deref().unwrap_or_default().parse()
    }

    fn wants_refresh(&self) -> bool {
        matches!(
            self.refresh.as_deref().map(str::trim),
            Some("1") | Some("true")
        )
    }
}

fn cache_headers(digest: &CachedDigest, status: CacheStatus) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(
        HeaderName::from_static(HEADER_DIGEST_CACHE),
        HeaderValue::from_static(status.as_header()),
    );
    if let Ok(v) = HeaderValue::from_str(&format!("\"{}\"", digest.fingerprint)) {
        h.insert(header::ETAG, v);
    }
    h
}

async fn get_news(
    State(state): State<AppState>,
    Query(q): Query<NewsQuery>,
) -> Result<Response, DigestError> {
    let region = q.region()?;
    let force = q.wants_refresh();

    if state.session.lock().await.activate(region) {
        tracing::debug!(target: "api", %region, "session region activated");
    }

    let (digest, status) = state.service.digest(region, force).await?;
    tracing::info!(
        target: "api",
        %region,
        force,
        cache = status.as_header(),
        fingerprint = %digest.fingerprint,
        "news served"
    );
    let body = DigestResponse::from_digest(&digest, state.service.next_refresh());
    Ok((cache_headers(&digest, status), Json(body)).into_response())
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlocksOut {
    region: Region,
    generated_at: DateTime<Utc>,
    blocks: Vec<DisplayBlock>,
}

async fn get_blocks(
    State(state): State<AppState>,
    Query(q): Query<NewsQuery>,
) -> Result<Response, DigestError> {
    let region = q.region()?;
    let (digest, status) = state.service.digest(region, false).await?;
    let body = BlocksOut {
        region,
        generated_at: digest.generated_at,
        blocks: digest.blocks(),
    };
    Ok((cache_headers(&digest, status), Json(body)).into_response())
}

async fn get_snapshot(
    State(state): State<AppState>,
    Query(q): Query<NewsQuery>,
) -> Result<Response, DigestError> {
    let region = q.region()?;
    let (digest, _) = state.service.digest(region, false).await?;
    let html = snapshot::render_html(&digest, &state.snapshot, state.service.next_refresh());
    let filename = snapshot::snapshot_filename_for(&digest, state.service.policy());

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| DigestError::Configuration(format!("snapshot header: {e}")))?;
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        ),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    tracing::info!(target: "api", %region, %filename, "snapshot exported");
    Ok((headers, html).into_response())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleOut {
    active_region: Option<Region>,
    pending_refresh_at: Option<DateTime<Utc>>,
    next_refresh_at: DateTime<Utc>,
    daily_reset_hour: u32,
    timezone_offset_minutes: i32,
    provider: &'static str,
}

async fn get_schedule(State(state): State<AppState>) -> Json<ScheduleOut> {
    let session = state.session.lock().await;
    let policy = state.service.policy();
    Json(ScheduleOut {
        active_region: session.active_region(),
        pending_refresh_at: session.pending().map(|(_, at)| at),
        next_refresh_at: state.service.next_refresh(),
        daily_reset_hour: policy.daily_reset_hour(),
        timezone_offset_minutes: policy.timezone_offset_minutes(),
        provider: state.service.provider_name(),
    })
}

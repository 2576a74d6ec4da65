// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/news (default region, MISS → HIT, refresh=1, ETag)
// - error mapping: 400 bad region, 502 upstream, 500 missing key
// - OPTIONS preflight CORS headers
// - GET /api/news/blocks, /api/news/snapshot, /api/schedule

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use global_pulse::ai_adapter::{DynProvider, GeminiProvider, MockProvider};
use global_pulse::config::ProviderConfig;
use global_pulse::store::MemoryStore;
use global_pulse::{router, AppState, DigestError, DigestService, RefreshPolicy};

const BODY_LIMIT: usize = 1024 * 1024;

fn state_with(provider: DynProvider) -> AppState {
    let service = DigestService::new(
        provider,
        Arc::new(MemoryStore::new()),
        RefreshPolicy::default(),
        ProviderConfig::default(),
    );
    AppState::new(Arc::new(service))
}

fn mock_app() -> (Router, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::new());
    (router(state_with(provider.clone())), provider)
}

async fn get(app: &Router, uri: &str) -> Response {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    app.clone().oneshot(req).await.expect("oneshot")
}

async fn body_text(resp: Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    String::from_utf8(bytes).expect("utf8")
}

async fn body_json(resp: Response) -> Json {
    serde_json::from_str(&body_text(resp).await).expect("json body")
}

fn cache_header(resp: &Response) -> &str {
    resp.headers()
        .get("x-digest-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = mock_app();
    let resp = get(&app, "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await.trim(), "OK");
}

#[tokio::test]
async fn news_defaults_to_global_and_serves_ranked_chart() {
    let (app, _) = mock_app();
    let resp = get(&app, "/api/news").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(cache_header(&resp), "MISS");
    assert!(resp.headers().get(header::ETAG).is_some(), "missing ETag");

    let v = body_json(resp).await;
    assert_eq!(v["region"], "Global");
    assert!(v["markdown"].as_str().unwrap().contains("(Heat: 92)"));

    let scores: Vec<u64> = v["chartData"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["score"].as_u64().unwrap())
        .collect();
    assert_eq!(scores, [92, 88, 75, 61]);

    let headline_heats: Vec<u64> = v["headlines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["heat"].as_u64().unwrap())
        .collect();
    assert_eq!(headline_heats, [92, 88, 61, 75]);

    let sources = v["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[1]["title"], "未知来源");
    assert!(v["generatedAt"].is_string());
    assert!(v["nextRefreshAt"].is_string());
}

#[tokio::test]
async fn second_request_is_a_cache_hit_until_refresh_is_forced() {
    let (app, provider) = mock_app();

    let first = get(&app, "/api/news?region=Tech").await;
    assert_eq!(cache_header(&first), "MISS");
    let etag = first.headers().get(header::ETAG).cloned();

    let second = get(&app, "/api/news?region=tech").await;
    assert_eq!(cache_header(&second), "HIT");
    assert_eq!(second.headers().get(header::ETAG).cloned(), etag);
    assert_eq!(provider.calls(), 1);

    let forced = get(&app, "/api/news?region=Tech&refresh=1").await;
    assert_eq!(forced.status(), StatusCode::OK);
    assert_eq!(cache_header(&forced), "MISS");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn unknown_region_is_bad_request() {
    let (app, provider) = mock_app();
    let resp = get(&app, "/api/news?region=Mars").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = body_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("Mars"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn preflight_allows_any_origin() {
    let (app, _) = mock_app();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/news")
        .header("origin", "https://dashboard.example")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .expect("build OPTIONS");
    let resp = app.oneshot(req).await.expect("oneshot");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let methods = resp
        .headers()
        .get("access-control-allow-methods")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(methods.contains("GET") && methods.contains("OPTIONS"), "{methods}");
}

#[tokio::test]
async fn upstream_failure_maps_to_bad_gateway() {
    let provider = Arc::new(
        MockProvider::new().failing(DigestError::upstream(Some(503), "quota exhausted")),
    );
    let app = router(state_with(provider));

    let resp = get(&app, "/api/news?region=Finance").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let v = body_json(resp).await;
    assert_eq!(v["error"], "Failed to fetch from upstream AI provider");
    assert_eq!(v["details"], "quota exhausted");
    assert_eq!(v["retryable"], true);
}

#[tokio::test]
async fn missing_api_key_is_a_configuration_error() {
    let cfg = ProviderConfig {
        api_key: String::new(),
        ..ProviderConfig::default()
    };
    let provider = Arc::new(GeminiProvider::new(&cfg).expect("client builds"));
    let app = router(state_with(provider));

    let resp = get(&app, "/api/news").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let v = body_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("API_KEY"));
    assert_eq!(v["retryable"], false);
}

#[tokio::test]
async fn blocks_endpoint_returns_typed_blocks() {
    let (app, _) = mock_app();
    let resp = get(&app, "/api/news/blocks?region=Sports").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["region"], "Sports");
    let blocks = v["blocks"].as_array().unwrap();
    assert_eq!(blocks[0]["type"], "heading");
    assert_eq!(blocks[0]["heat"], 92);
    assert!(blocks.iter().any(|b| b["type"] == "list_item"));
}

#[tokio::test]
async fn snapshot_is_an_html_attachment_without_images() {
    let (app, _) = mock_app();
    let resp = get(&app, "/api/news/snapshot?region=China").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let ctype = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(ctype.starts_with("text/html"));
    let disposition = resp.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"global-pulse-China-"));
    assert!(disposition.ends_with(".html\""));

    let html = body_text(resp).await;
    assert!(html.contains("<strong>纽约</strong>"));
    assert!(html.contains("reuters.com"));
    assert!(!html.contains("<img"));
}

#[tokio::test]
async fn schedule_reports_the_active_region() {
    let (app, _) = mock_app();
    let before = body_json(get(&app, "/api/schedule").await).await;
    assert!(before["activeRegion"].is_null());
    assert_eq!(before["dailyResetHour"], 6);
    assert_eq!(before["timezoneOffsetMinutes"], 480);
    assert_eq!(before["provider"], "mock");

    let _ = get(&app, "/api/news?region=Finance").await;
    let after = body_json(get(&app, "/api/schedule").await).await;
    assert_eq!(after["activeRegion"], "Finance");
    assert_eq!(after["pendingRefreshAt"], after["nextRefreshAt"]);
}

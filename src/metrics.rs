// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const FETCH_TOTAL: &str = "digest_fetch_total";
pub const FETCH_ERRORS_TOTAL: &str = "digest_fetch_errors_total";
pub const CACHE_HITS_TOTAL: &str = "digest_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "digest_cache_misses_total";
pub const FETCH_DURATION_MS: &str = "digest_fetch_duration_ms";
pub const NEXT_REFRESH_TS: &str = "digest_next_refresh_ts";

/// Process-wide Prometheus recorder; `None` if another recorder was installed first.
static HANDLE: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the recorder once per process and describe our series.
    pub fn init() -> Option<Self> {
        let handle = HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(h) => {
                describe();
                Some(h)
            }
            Err(e) => {
                tracing::warn!(target: "metrics", "prometheus recorder not installed: {e}");
                None
            }
        });
        handle.clone().map(|handle| Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!(FETCH_TOTAL, "Successful provider fetches.");
    describe_counter!(FETCH_ERRORS_TOTAL, "Failed provider fetches, by kind.");
    describe_counter!(CACHE_HITS_TOTAL, "Digest requests served from cache, by layer.");
    describe_counter!(CACHE_MISSES_TOTAL, "Digest requests that required a fetch.");
    describe_histogram!(FETCH_DURATION_MS, "Provider fetch time in milliseconds.");
    describe_gauge!(NEXT_REFRESH_TS, "Unix ts of the next scheduled refresh.");
}

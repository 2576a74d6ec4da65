// src/service.rs
//! Digest service: fetch-or-reuse for one region at a time.
//!
//! Lookup order is memory slot → local store → provider. Fetches for a region
//! are single-flight, and the slot only ever moves forward in time
//! (last writer wins on `generated_at`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use tokio::sync::Mutex;

use crate::ai_adapter::{DynProvider, GenerationRequest};
use crate::config::ProviderConfig;
use crate::digest::CachedDigest;
use crate::error::DigestError;
use crate::metrics as m;
use crate::region::{Region, ALL_REGIONS};
use crate::schedule::{self, Clock, RefreshPolicy, SystemClock};
use crate::store::DigestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the in-memory slot.
    Hit,
    /// Served from the local store after a restart.
    Stored,
    /// Freshly fetched from the provider.
    Miss,
}

impl CacheStatus {
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit | CacheStatus::Stored => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Default)]
struct Slot {
    current: RwLock<Option<Arc<CachedDigest>>>,
    fetch_lock: Mutex<()>,
}

impl Slot {
    fn current(&self) -> Option<Arc<CachedDigest>> {
        self.current.read().ok().and_then(|g| g.clone())
    }
}

pub struct DigestService {
    provider: DynProvider,
    store: Arc<dyn DigestStore>,
    policy: RefreshPolicy,
    provider_cfg: ProviderConfig,
    clock: Arc<dyn Clock>,
    slots: HashMap<Region, Arc<Slot>>,
}

impl DigestService {
    pub fn new(
        provider: DynProvider,
        store: Arc<dyn DigestStore>,
        policy: RefreshPolicy,
        provider_cfg: ProviderConfig,
    ) -> Self {
        let slots = ALL_REGIONS
            .iter()
            .map(|r| (*r, Arc::new(Slot::default())))
            .collect();
        Self {
            provider,
            store,
            policy,
            provider_cfg,
            clock: Arc::new(SystemClock),
            slots,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn next_refresh(&self) -> DateTime<Utc> {
        schedule::next_refresh_instant(self.now(), &self.policy)
    }

    fn slot(&self, region: Region) -> Arc<Slot> {
        // every region gets a slot in `new`
        self.slots
            .get(&region)
            .cloned()
            .unwrap_or_else(|| Arc::new(Slot::default()))
    }

    /// In-memory digest for `region`, fresh or not.
    pub fn peek(&self, region: Region) -> Option<Arc<CachedDigest>> {
        self.slot(region).current()
    }

    pub fn is_fresh(&self, digest: &CachedDigest) -> bool {
        schedule::is_valid(digest.generated_at, self.now(), &self.policy)
    }

    /// Returns a valid digest for `region`, fetching only when needed.
    /// `force` skips the freshness check (manual or scheduled refresh).
    pub async fn digest(
        &self,
        region: Region,
        force: bool,
    ) -> Result<(Arc<CachedDigest>, CacheStatus), DigestError> {
        let slot = self.slot(region);
        let arrived = self.now();

        if !force {
            if let Some(d) = slot.current().filter(|d| self.is_fresh(d)) {
                counter!(m::CACHE_HITS_TOTAL, "layer" => "memory").increment(1);
                return Ok((d, CacheStatus::Hit));
            }
        }

        let _in_flight = slot.fetch_lock.lock().await;

        // Another caller may have completed a fetch while we waited.
        if let Some(d) = slot.current() {
            let superseded = force && d.generated_at >= arrived;
            if superseded || (!force && self.is_fresh(&d)) {
                counter!(m::CACHE_HITS_TOTAL, "layer" => "memory").increment(1);
                return Ok((d, CacheStatus::Hit));
            }
        }

        if !force {
            if let Some(d) = self.store.load(region).await.filter(|d| self.is_fresh(d)) {
                counter!(m::CACHE_HITS_TOTAL, "layer" => "store").increment(1);
                tracing::debug!(target: "digest", %region, fingerprint = %d.fingerprint, "digest restored from store");
                return Ok((self.install(&slot, d), CacheStatus::Stored));
            }
        }

        counter!(m::CACHE_MISSES_TOTAL).increment(1);
        let d = self.fetch(region).await?;
        Ok((self.install(&slot, d), CacheStatus::Miss))
    }

    /// Forced refetch (manual `refresh=1` semantics).
    pub async fn refresh(&self, region: Region) -> Result<Arc<CachedDigest>, DigestError> {
        self.digest(region, true).await.map(|(d, _)| d)
    }

    async fn fetch(&self, region: Region) -> Result<CachedDigest, DigestError> {
        let req = GenerationRequest::for_region(region, &self.provider_cfg);
        let started = Instant::now();
        let out = self.provider.generate(&req).await;
        histogram!(m::FETCH_DURATION_MS).record(started.elapsed().as_millis() as f64);

        let generation = match out {
            Ok(g) => g,
            Err(e) => {
                counter!(m::FETCH_ERRORS_TOTAL, "kind" => e.kind()).increment(1);
                tracing::warn!(target: "digest", %region, provider = self.provider.name(), kind = e.kind(), "digest fetch failed: {e}");
                return Err(e);
            }
        };

        let digest = CachedDigest::new(
            region,
            self.now(),
            generation.text,
            generation.citations,
        );
        counter!(m::FETCH_TOTAL).increment(1);
        tracing::info!(
            target: "digest",
            %region,
            fingerprint = %digest.fingerprint,
            headlines = digest.chart_series.len(),
            sources = digest.sources.len(),
            "digest fetched"
        );

        if let Err(e) = self.store.save(&digest).await {
            tracing::warn!(target: "store", %region, "digest not persisted: {e}");
        }
        Ok(digest)
    }

    /// Replaces the slot unless it already holds a newer digest; returns what the slot holds.
    fn install(&self, slot: &Slot, digest: CachedDigest) -> Arc<CachedDigest> {
        let incoming = Arc::new(digest);
        let Ok(mut g) = slot.current.write() else {
            return incoming;
        };
        match g.as_ref() {
            Some(existing) if existing.generated_at > incoming.generated_at => existing.clone(),
            _ => {
                *g = Some(incoming.clone());
                incoming
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_adapter::MockProvider;
    use crate::schedule::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{FixedOffset, TimeZone};

    fn china(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn install_never_moves_backwards() {
        let svc = DigestService::new(
            Arc::new(MockProvider::new()),
            Arc::new(MemoryStore::new()),
            RefreshPolicy::default(),
            ProviderConfig::default(),
        );
        let slot = svc.slot(Region::Global);
        let newer = CachedDigest::new(Region::Global, china(10, 9, 0), Some("new".into()), vec![]);
        let older = CachedDigest::new(Region::Global, china(10, 8, 0), Some("old".into()), vec![]);
        svc.install(&slot, newer);
        let kept = svc.install(&slot, older);
        assert_eq!(kept.markdown, "new");
        assert_eq!(svc.peek(Region::Global).unwrap().markdown, "new");
    }

    #[tokio::test]
    async fn stale_memory_triggers_refetch_after_reset() {
        let clock = Arc::new(ManualClock::new(china(10, 5, 0)));
        let provider = Arc::new(MockProvider::new());
        let svc = DigestService::new(
            provider.clone(),
            Arc::new(MemoryStore::new()),
            RefreshPolicy::default(),
            ProviderConfig::default(),
        )
        .with_clock(clock.clone());

        let (_, s1) = svc.digest(Region::Tech, false).await.unwrap();
        clock.set(china(10, 5, 59));
        let (_, s2) = svc.digest(Region::Tech, false).await.unwrap();
        clock.set(china(10, 6, 1));
        let (d3, s3) = svc.digest(Region::Tech, false).await.unwrap();

        assert_eq!(
            (s1, s2, s3),
            (CacheStatus::Miss, CacheStatus::Hit, CacheStatus::Miss)
        );
        assert_eq!(d3.generated_at, china(10, 6, 1));
        assert_eq!(provider.calls(), 2);
    }
}

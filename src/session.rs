// src/session.rs
//! Session controller: owns the single pending refresh timer.
//!
//! Switching the active region drops (and thereby aborts) the previous timer
//! before the next one is spawned, so two timers never coexist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::gauge;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::metrics as m;
use crate::region::Region;
use crate::service::DigestService;

/// Cancellation handle for one scheduled refresh loop. Dropping it aborts the loop.
#[derive(Debug)]
pub struct RefreshTimer {
    region: Region,
    due: watch::Receiver<DateTime<Utc>>,
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    /// Spawn a loop that runs fetch-or-reuse for `region` at every daily reset.
    pub fn spawn(service: Arc<DigestService>, region: Region) -> Self {
        let first_due = service.next_refresh();
        let (tx, rx) = watch::channel(first_due);

        let handle = tokio::spawn(async move {
            let mut due = first_due;
            loop {
                gauge!(m::NEXT_REFRESH_TS).set(due.timestamp() as f64);
                tracing::info!(target: "scheduler", %region, due = %due, "next refresh scheduled");

                let wait = (due - service.now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tokio::time::sleep(wait).await;
                if service.now() < due {
                    // woke early relative to the wall clock
                    continue;
                }

                // anything generated before the reset is stale by now; a digest
                // fetched after it (e.g. by a request) is reused
                match service.digest(region, false).await {
                    Ok((d, status)) => tracing::info!(
                        target: "scheduler",
                        %region,
                        cache = status.as_header(),
                        fingerprint = %d.fingerprint,
                        "scheduled refresh done"
                    ),
                    Err(e) => tracing::warn!(
                        target: "scheduler",
                        %region,
                        kind = e.kind(),
                        "scheduled refresh failed: {e}"
                    ),
                }

                due = service.next_refresh();
                if tx.send(due).is_err() {
                    break;
                }
            }
        });

        Self {
            region,
            due: rx,
            handle,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        *self.due.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Explicit form of drop.
    pub fn cancel(self) {}
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One logical dashboard session: an active region and at most one pending timer.
pub struct SessionController {
    service: Arc<DigestService>,
    timer: Option<RefreshTimer>,
}

impl SessionController {
    pub fn new(service: Arc<DigestService>) -> Self {
        Self {
            service,
            timer: None,
        }
    }

    /// Make `region` active. Returns `true` when a new timer was scheduled.
    pub fn activate(&mut self, region: Region) -> bool {
        if let Some(t) = &self.timer {
            if t.region() == region && !t.is_finished() {
                return false;
            }
        }
        if let Some(previous) = self.timer.take() {
            tracing::info!(target: "scheduler", from = %previous.region(), to = %region, "active region changed; pending refresh cancelled");
            previous.cancel();
        }
        self.timer = Some(RefreshTimer::spawn(self.service.clone(), region));
        true
    }

    /// Cancel the pending refresh, if any.
    pub fn deactivate(&mut self) {
        self.timer = None;
    }

    pub fn active_region(&self) -> Option<Region> {
        self.timer.as_ref().map(RefreshTimer::region)
    }

    /// Region and due instant of the pending refresh.
    pub fn pending(&self) -> Option<(Region, DateTime<Utc>)> {
        self.timer.as_ref().map(|t| (t.region(), t.due_at()))
    }
}

// src/schedule.rs
//! Daily refresh scheduling in a fixed-offset timezone.
//!
//! A digest is fresh until the next daily reset instant (e.g. 06:00 China time).
//! Everything here is pure: instants in, predicates and instants out.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DigestError;

pub const DEFAULT_RESET_HOUR: u32 = 6;
/// UTC+8 (China Standard Time).
pub const DEFAULT_TZ_OFFSET_MINUTES: i32 = 8 * 60;

const DAY: i64 = 24;

/// Immutable refresh configuration. Construct via [`RefreshPolicy::new`] so the
/// hour and offset ranges are always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct RefreshPolicy {
    daily_reset_hour: u32,
    offset: FixedOffset,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawPolicy {
    #[serde(default = "default_reset_hour")]
    daily_reset_hour: u32,
    #[serde(default = "default_tz_offset")]
    timezone_offset_minutes: i32,
}

fn default_reset_hour() -> u32 {
    DEFAULT_RESET_HOUR
}
fn default_tz_offset() -> i32 {
    DEFAULT_TZ_OFFSET_MINUTES
}

impl TryFrom<RawPolicy> for RefreshPolicy {
    type Error = DigestError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        RefreshPolicy::new(raw.daily_reset_hour, raw.timezone_offset_minutes)
    }
}

impl From<RefreshPolicy> for RawPolicy {
    fn from(p: RefreshPolicy) -> Self {
        RawPolicy {
            daily_reset_hour: p.daily_reset_hour,
            timezone_offset_minutes: p.timezone_offset_minutes(),
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            daily_reset_hour: DEFAULT_RESET_HOUR,
            // 28_800s is always inside FixedOffset's ±86_400s range.
            offset: FixedOffset::east_opt(DEFAULT_TZ_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl RefreshPolicy {
    pub fn new(daily_reset_hour: u32, timezone_offset_minutes: i32) -> Result<Self, DigestError> {
        if daily_reset_hour > 23 {
            return Err(DigestError::Configuration(format!(
                "daily_reset_hour must be within 0..=23, got {daily_reset_hour}"
            )));
        }
        let offset = timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                DigestError::Configuration(format!(
                    "timezone_offset_minutes out of range: {timezone_offset_minutes}"
                ))
            })?;
        Ok(Self {
            daily_reset_hour,
            offset,
        })
    }

    pub fn daily_reset_hour(&self) -> u32 {
        self.daily_reset_hour
    }

    pub fn timezone_offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The one place where an absolute instant becomes a wall-clock reading.
    pub fn civil(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Reset instant on the given civil date, as an absolute instant.
    fn reset_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN) + Duration::hours(self.daily_reset_hour as i64);
        let utc = local - Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc)
    }

    /// Today's reset instant (civil "today" in the policy offset).
    pub fn todays_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.reset_on(self.civil(now).date_naive())
    }

    /// Most recent reset instant that is `<= now`.
    pub fn last_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.todays_reset(now);
        if self.civil(now).hour() < self.daily_reset_hour {
            today - Duration::hours(DAY)
        } else {
            today
        }
    }
}

/// True iff `cached_at` is strictly after the effective last reset.
pub fn is_valid(cached_at: DateTime<Utc>, now: DateTime<Utc>, policy: &RefreshPolicy) -> bool {
    cached_at > policy.last_reset(now)
}

/// Next reset strictly after `now`; at exactly the reset instant this is one day later.
pub fn next_refresh_instant(now: DateTime<Utc>, policy: &RefreshPolicy) -> DateTime<Utc> {
    policy.last_reset(now) + Duration::hours(DAY)
}

/// Wait time until [`next_refresh_instant`]; never zero, at most 24h.
pub fn until_next_refresh(now: DateTime<Utc>, policy: &RefreshPolicy) -> std::time::Duration {
    (next_refresh_instant(now, policy) - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(1))
}

/// Source of "now" for the service and its timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut g = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *g = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut g = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

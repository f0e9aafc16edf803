//! Sliding-window request quotas per credential identity.
//!
//! Each identity owns an ordered list of accepted request timestamps. A
//! request is allowed when fewer than `requests_per_hour` timestamps fall in
//! the trailing hour and fewer than `requests_per_minute` fall in the trailing
//! minute. Denied requests are not recorded.
//!
//! The check-and-append for one identity runs under that identity's map entry
//! lock, so concurrent requests from one caller cannot overshoot the quota.
//! Distinct identities live in different shards and rarely contend.
//!
//! Callers that only know later whether a request should count take a
//! [`RateReservation`]: the slot is held at once and handed back on drop
//! unless the reservation is committed.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use exgate_core::Clock;
use serde::Serialize;
use tracing::{debug, warn};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;

/// Snapshot of rate table occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    /// Identities with a stored window.
    pub total_identities: usize,
    /// Identities with at least one request in the trailing hour.
    pub active_identities: usize,
}

/// Budget left for an identity, without consuming any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateQuota {
    /// Requests still allowed in the trailing minute.
    pub minute: u32,
    /// Requests still allowed in the trailing hour.
    pub hour: u32,
}

/// Per-identity sliding-window limiter.
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<i64>>,
    requests_per_minute: u32,
    requests_per_hour: u32,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("identities", &self.windows.len())
            .field("requests_per_minute", &self.requests_per_minute)
            .field("requests_per_hour", &self.requests_per_hour)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter with the given per-minute and per-hour quotas.
    #[must_use]
    pub fn new(requests_per_minute: u32, requests_per_hour: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            requests_per_minute,
            requests_per_hour,
            clock,
        }
    }

    /// Check the quota for `identity` and record the request if it fits.
    pub fn is_allowed(&self, identity: &str) -> bool {
        match self.try_reserve(identity) {
            Some(reservation) => {
                reservation.commit();
                true
            }
            None => false,
        }
    }

    /// Hold one slot of `identity`'s quota, or `None` if the quota is spent.
    ///
    /// The slot counts against concurrent checks straight away. Dropping the
    /// reservation without [`RateReservation::commit`] gives it back.
    pub fn try_reserve(&self, identity: &str) -> Option<RateReservation<'_>> {
        let now = self.clock.now_millis();
        let mut window = self.windows.entry(identity.to_owned()).or_default();
        prune(&mut window, now);

        let (minute, hour) = counts(&window, now);
        if hour >= self.requests_per_hour {
            warn!(identity = %identity, hour, "Hourly rate limit exceeded");
            return None;
        }
        if minute >= self.requests_per_minute {
            warn!(identity = %identity, minute, "Per-minute rate limit exceeded");
            return None;
        }

        // Keep the window ordered even if the clock stepped backwards.
        let pos = window.partition_point(|ts| *ts <= now);
        window.insert(pos, now);
        Some(RateReservation {
            limiter: self,
            identity: identity.to_owned(),
            at: now,
            committed: false,
        })
    }

    /// Remove one request recorded at `at` from `identity`'s window.
    fn release(&self, identity: &str, at: i64) {
        if let Some(mut window) = self.windows.get_mut(identity) {
            if let Some(pos) = window.iter().rposition(|ts| *ts == at) {
                window.remove(pos);
                debug!(identity = %identity, "Returned reserved rate slot");
            }
        }
    }

    /// Budget left for `identity` in each window.
    #[must_use]
    pub fn remaining(&self, identity: &str) -> RateQuota {
        let now = self.clock.now_millis();
        let (minute, hour) = self
            .windows
            .get(identity)
            .map_or((0, 0), |window| counts(&window, now));
        RateQuota {
            minute: self.requests_per_minute.saturating_sub(minute),
            hour: self.requests_per_hour.saturating_sub(hour),
        }
    }

    /// Forget every recorded request for `identity`.
    pub fn reset(&self, identity: &str) {
        if self.windows.remove(identity).is_some() {
            debug!(identity = %identity, "Reset rate window");
        }
    }

    /// Remove identities whose whole window lies outside the trailing hour.
    ///
    /// Returns the number of identities removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0usize;
        self.windows.retain(|_, window| {
            prune(window, now);
            let keep = !window.is_empty();
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.windows.len(), "Swept idle rate windows");
        }
        removed
    }

    /// Current occupancy.
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        let cutoff = self.clock.now_millis() - HOUR_MS;
        let active_identities = self
            .windows
            .iter()
            .filter(|entry| entry.value().back().is_some_and(|ts| *ts > cutoff))
            .count();
        RateLimiterStats {
            total_identities: self.windows.len(),
            active_identities,
        }
    }
}

/// A quota slot held for a request whose outcome is not yet known.
#[derive(Debug)]
#[must_use = "an uncommitted reservation is returned when dropped"]
pub struct RateReservation<'a> {
    limiter: &'a RateLimiter,
    identity: String,
    at: i64,
    committed: bool,
}

impl RateReservation<'_> {
    /// Keep the slot: the request counts against the quota.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for RateReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limiter.release(&self.identity, self.at);
        }
    }
}

/// Drop timestamps at or before the start of the trailing hour.
fn prune(window: &mut VecDeque<i64>, now: i64) {
    let cutoff = now - HOUR_MS;
    while window.front().is_some_and(|ts| *ts <= cutoff) {
        window.pop_front();
    }
}

/// Requests in the trailing minute and trailing hour.
fn counts(window: &VecDeque<i64>, now: i64) -> (u32, u32) {
    let minute_cutoff = now - MINUTE_MS;
    let hour_cutoff = now - HOUR_MS;
    let mut minute = 0u32;
    let mut hour = 0u32;
    for ts in window.iter().rev() {
        if *ts <= hour_cutoff {
            break;
        }
        if *ts > now {
            continue;
        }
        hour += 1;
        if *ts > minute_cutoff {
            minute += 1;
        }
    }
    (minute, hour)
}

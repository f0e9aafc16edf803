//! Single-use nonce issuance and consumption.
//!
//! A nonce is 32 bytes from the thread-local CSPRNG, hex encoded. The store
//! remembers when each nonce was issued. Consuming a nonce removes it, and
//! that removal is the one-time guarantee: of any number of concurrent
//! `consume` calls for the same value, exactly one observes the entry.
//!
//! Absent, already-used and never-issued nonces are indistinguishable to
//! callers.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use exgate_core::Clock;
use rand::RngExt;
use serde::Serialize;
use tracing::{debug, info};

/// Snapshot of nonce table occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceStats {
    /// Entries currently stored, expired or not.
    pub total: usize,
    /// Entries still within their lifetime.
    pub active: usize,
}

/// Concurrent table of issued, unconsumed nonces.
pub struct NonceStore {
    /// Nonce value to issue time in epoch milliseconds.
    nonces: DashMap<String, i64>,
    expiration_ms: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NonceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceStore")
            .field("len", &self.nonces.len())
            .field("expiration_ms", &self.expiration_ms)
            .finish_non_exhaustive()
    }
}

impl NonceStore {
    /// Create an empty store whose nonces live for `expiration`.
    #[must_use]
    pub fn new(expiration: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            nonces: DashMap::new(),
            expiration_ms: i64::try_from(expiration.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    /// Issue and record a fresh nonce.
    #[must_use]
    pub fn issue(&self) -> String {
        let mut rng = rand::rng();
        let mut buf = [0u8; 32];
        rng.fill(&mut buf);
        let nonce = hex::encode(buf);

        self.nonces.insert(nonce.clone(), self.clock.now_millis());
        debug!(nonce = %prefix(&nonce), "Issued nonce");
        nonce
    }

    /// Consume a nonce, returning `true` only if it was issued, not yet
    /// consumed, and not expired.
    ///
    /// The entry is removed in every case where it exists, so an expired
    /// nonce is also cleaned up here.
    pub fn consume(&self, nonce: &str) -> bool {
        let Some((_, issued_at)) = self.nonces.remove(nonce) else {
            debug!(nonce = %prefix(nonce), "Nonce unknown or already consumed");
            return false;
        };

        let age = self.clock.now_millis().saturating_sub(issued_at);
        if age > self.expiration_ms {
            debug!(nonce = %prefix(nonce), age_ms = age, "Nonce expired");
            return false;
        }
        true
    }

    /// Remove every nonce older than the configured lifetime.
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut evicted = 0usize;
        self.nonces.retain(|_, issued_at| {
            let keep = now.saturating_sub(*issued_at) <= self.expiration_ms;
            if !keep {
                evicted += 1;
            }
            keep
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.nonces.len(), "Evicted expired nonces");
        }
        evicted
    }

    /// Current occupancy.
    #[must_use]
    pub fn stats(&self) -> NonceStats {
        let now = self.clock.now_millis();
        let active = self
            .nonces
            .iter()
            .filter(|entry| now.saturating_sub(*entry.value()) <= self.expiration_ms)
            .count();
        NonceStats {
            total: self.nonces.len(),
            active,
        }
    }

    /// Number of stored nonces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    /// Whether the store holds no nonces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }

    /// Drop every stored nonce. Outstanding nonces become unusable.
    pub fn clear(&self) {
        let dropped = self.nonces.len();
        self.nonces.clear();
        info!(dropped, "Cleared nonce store");
    }
}

/// Loggable prefix of a nonce; full values never reach the logs.
fn prefix(nonce: &str) -> &str {
    nonce.get(..8).unwrap_or("")
}

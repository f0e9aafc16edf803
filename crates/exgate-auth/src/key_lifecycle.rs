//! API key rotation tracking.

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::Serialize;

/// Expiry status of an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExpirationInfo {
    /// When the key expires.
    pub expires_at: DateTime<Utc>,
    /// Whether the key is past its expiry.
    pub is_expired: bool,
    /// Whole days left, rounded down; negative once expired.
    pub days_until_expiration: i64,
    /// Whether the key is inside the rotation warning period.
    pub should_rotate: bool,
}

/// How long a key lives and when to start warning about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRotationPolicy {
    rotation_period_days: i64,
    warn_before_days: i64,
}

impl Default for KeyRotationPolicy {
    fn default() -> Self {
        Self::new(30, 7)
    }
}

impl KeyRotationPolicy {
    /// Build a policy. Negative values are clamped to zero.
    #[must_use]
    pub fn new(rotation_period_days: i64, warn_before_days: i64) -> Self {
        Self {
            rotation_period_days: rotation_period_days.max(0),
            warn_before_days: warn_before_days.max(0),
        }
    }

    /// Evaluate a key last rotated at `last_rotation` as of `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use exgate_auth::key_lifecycle::KeyRotationPolicy;
    ///
    /// let now = Utc::now();
    /// let info = KeyRotationPolicy::default().evaluate(now - Duration::days(25), now);
    /// assert_eq!(info.days_until_expiration, 5);
    /// assert!(info.should_rotate);
    /// assert!(!info.is_expired);
    /// ```
    #[must_use]
    pub fn evaluate(&self, last_rotation: DateTime<Utc>, now: DateTime<Utc>) -> KeyExpirationInfo {
        // Saturates at the latest representable instant.
        let expires_at = TimeDelta::try_days(self.rotation_period_days)
            .and_then(|period| last_rotation.checked_add_signed(period))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let remaining = expires_at - now;
        let is_expired = remaining <= Duration::zero();
        let days_until_expiration = remaining.num_seconds().div_euclid(86_400);

        KeyExpirationInfo {
            expires_at,
            is_expired,
            days_until_expiration,
            should_rotate: is_expired || days_until_expiration <= self.warn_before_days,
        }
    }
}

//! Configuration for the exgate authentication layer.
//!
//! All configuration is driven by environment variables prefixed with
//! `EXGATE_`. Every value has a default, so an empty environment yields a
//! working configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use typed_builder::TypedBuilder;

use crate::error::{ExgateError, ExgateResult};

/// Patterns rejected by the payload integrity scan unless overridden.
const DEFAULT_FORBIDDEN_PATTERNS: &[&str] = &[r"(?i)<\s*script", r"(?i)javascript:", r"\.\./"];

/// Longest accepted key rotation period, in days.
pub const MAX_KEY_ROTATION_DAYS: i64 = 3650;

/// Authentication layer configuration.
///
/// # Examples
///
/// ```
/// use exgate_core::AuthConfig;
///
/// let config = AuthConfig::default();
/// assert_eq!(config.recv_window_ms, 5000);
/// assert_eq!(config.requests_per_minute, 60);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// `X-BAPI-RECV-WINDOW` value attached to outbound requests, in milliseconds.
    #[builder(default = 5000)]
    pub recv_window_ms: i64,

    /// Maximum allowed skew between an inbound timestamp and local time, in milliseconds.
    #[builder(default = 5000)]
    pub timestamp_tolerance_ms: i64,

    /// Lifetime of an issued nonce, in seconds.
    #[builder(default = 300)]
    pub nonce_expiration_secs: u64,

    /// Interval between background nonce evictions, in seconds.
    #[builder(default = 60)]
    pub nonce_cleanup_interval_secs: u64,

    /// Whether the inbound pipeline enforces per-identity rate limits.
    #[builder(default = true)]
    pub rate_limit_enabled: bool,

    /// Requests allowed per identity in any trailing 60 seconds.
    #[builder(default = 60)]
    pub requests_per_minute: u32,

    /// Requests allowed per identity in any trailing hour.
    #[builder(default = 1000)]
    pub requests_per_hour: u32,

    /// Interval between background rate-window sweeps, in seconds.
    #[builder(default = 300)]
    pub rate_limit_cleanup_interval_secs: u64,

    /// Maximum inbound body size accepted by the integrity scan.
    #[builder(default = 1_048_576)]
    pub max_payload_bytes: usize,

    /// Maximum number of query parameters accepted by the integrity scan.
    #[builder(default = 100)]
    pub max_params: usize,

    /// Regular expressions that fail the integrity scan when found in a payload.
    #[builder(default = default_forbidden_patterns())]
    pub forbidden_patterns: Vec<String>,

    /// Days after the last rotation at which an API key expires.
    #[builder(default = 30)]
    pub key_rotation_days: i64,

    /// Days before expiry at which a key should be rotated.
    #[builder(default = 7)]
    pub key_rotation_warn_days: i64,

    /// Upper bound on how long shutdown waits for background tasks, in seconds.
    #[builder(default = 5)]
    pub shutdown_timeout_secs: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            recv_window_ms: 5000,
            timestamp_tolerance_ms: 5000,
            nonce_expiration_secs: 300,
            nonce_cleanup_interval_secs: 60,
            rate_limit_enabled: true,
            requests_per_minute: 60,
            requests_per_hour: 1000,
            rate_limit_cleanup_interval_secs: 300,
            max_payload_bytes: 1_048_576,
            max_params: 100,
            forbidden_patterns: default_forbidden_patterns(),
            key_rotation_days: 30,
            key_rotation_warn_days: 7,
            shutdown_timeout_secs: 5,
            log_level: String::from("info"),
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `EXGATE_RECV_WINDOW_MS` | `5000` |
    /// | `EXGATE_TIMESTAMP_TOLERANCE_MS` | `5000` |
    /// | `EXGATE_NONCE_EXPIRATION_SECS` | `300` |
    /// | `EXGATE_NONCE_CLEANUP_INTERVAL_SECS` | `60` |
    /// | `EXGATE_RATE_LIMIT_ENABLED` | `true` |
    /// | `EXGATE_REQUESTS_PER_MINUTE` | `60` |
    /// | `EXGATE_REQUESTS_PER_HOUR` | `1000` |
    /// | `EXGATE_RATE_LIMIT_CLEANUP_INTERVAL_SECS` | `300` |
    /// | `EXGATE_MAX_PAYLOAD_BYTES` | `1048576` |
    /// | `EXGATE_MAX_PARAMS` | `100` |
    /// | `EXGATE_KEY_ROTATION_DAYS` | `30` |
    /// | `EXGATE_KEY_ROTATION_WARN_DAYS` | `7` |
    /// | `EXGATE_SHUTDOWN_TIMEOUT_SECS` | `5` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// Values that fail to parse are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        parse_into(&lookup, "EXGATE_RECV_WINDOW_MS", &mut config.recv_window_ms);
        parse_into(
            &lookup,
            "EXGATE_TIMESTAMP_TOLERANCE_MS",
            &mut config.timestamp_tolerance_ms,
        );
        parse_into(
            &lookup,
            "EXGATE_NONCE_EXPIRATION_SECS",
            &mut config.nonce_expiration_secs,
        );
        parse_into(
            &lookup,
            "EXGATE_NONCE_CLEANUP_INTERVAL_SECS",
            &mut config.nonce_cleanup_interval_secs,
        );
        if let Some(v) = lookup("EXGATE_RATE_LIMIT_ENABLED") {
            config.rate_limit_enabled = parse_bool(&v);
        }
        parse_into(
            &lookup,
            "EXGATE_REQUESTS_PER_MINUTE",
            &mut config.requests_per_minute,
        );
        parse_into(
            &lookup,
            "EXGATE_REQUESTS_PER_HOUR",
            &mut config.requests_per_hour,
        );
        parse_into(
            &lookup,
            "EXGATE_RATE_LIMIT_CLEANUP_INTERVAL_SECS",
            &mut config.rate_limit_cleanup_interval_secs,
        );
        parse_into(
            &lookup,
            "EXGATE_MAX_PAYLOAD_BYTES",
            &mut config.max_payload_bytes,
        );
        parse_into(&lookup, "EXGATE_MAX_PARAMS", &mut config.max_params);
        parse_into(
            &lookup,
            "EXGATE_KEY_ROTATION_DAYS",
            &mut config.key_rotation_days,
        );
        parse_into(
            &lookup,
            "EXGATE_KEY_ROTATION_WARN_DAYS",
            &mut config.key_rotation_warn_days,
        );
        parse_into(
            &lookup,
            "EXGATE_SHUTDOWN_TIMEOUT_SECS",
            &mut config.shutdown_timeout_secs,
        );
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Check that every value is within its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ExgateError::Config`] naming the first offending field.
    pub fn validate(&self) -> ExgateResult<()> {
        if self.recv_window_ms <= 0 {
            return Err(ExgateError::Config("recvWindowMs must be positive".to_owned()));
        }
        if self.timestamp_tolerance_ms < 0 {
            return Err(ExgateError::Config(
                "timestampToleranceMs must not be negative".to_owned(),
            ));
        }
        if self.nonce_expiration_secs == 0 {
            return Err(ExgateError::Config(
                "nonceExpirationSecs must be positive".to_owned(),
            ));
        }
        if self.nonce_cleanup_interval_secs == 0 || self.rate_limit_cleanup_interval_secs == 0 {
            return Err(ExgateError::Config(
                "cleanup intervals must be positive".to_owned(),
            ));
        }
        if self.requests_per_minute == 0 || self.requests_per_hour == 0 {
            return Err(ExgateError::Config("rate limits must be positive".to_owned()));
        }
        if !(1..=MAX_KEY_ROTATION_DAYS).contains(&self.key_rotation_days) {
            return Err(ExgateError::Config(format!(
                "keyRotationDays must be between 1 and {MAX_KEY_ROTATION_DAYS}"
            )));
        }
        if self.key_rotation_warn_days < 0 || self.key_rotation_warn_days > self.key_rotation_days
        {
            return Err(ExgateError::Config(format!(
                "keyRotationWarnDays must be between 0 and keyRotationDays ({})",
                self.key_rotation_days
            )));
        }
        Ok(())
    }

    /// Nonce lifetime as a [`Duration`].
    #[must_use]
    pub fn nonce_expiration(&self) -> Duration {
        Duration::from_secs(self.nonce_expiration_secs)
    }

    /// Nonce eviction interval as a [`Duration`].
    #[must_use]
    pub fn nonce_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.nonce_cleanup_interval_secs)
    }

    /// Rate-window sweep interval as a [`Duration`].
    #[must_use]
    pub fn rate_limit_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cleanup_interval_secs)
    }

    /// Shutdown wait bound as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_forbidden_patterns() -> Vec<String> {
    DEFAULT_FORBIDDEN_PATTERNS
        .iter()
        .map(|p| (*p).to_owned())
        .collect()
}

/// Parse the variable `name` into `target`, leaving it untouched when unset or invalid.
fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => warn!(variable = name, value = %raw, "ignoring unparsable environment value"),
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

//! Integration tests for the exgate auth layer.
//!
//! These tests wire the real components together (credential provider,
//! signature engine, nonce store, rate limiter, authenticator) and drive them
//! with a manual clock, so they run in-process with no external services.
//!
//! Run them with:
//! ```text
//! cargo test -p exgate-integration
//! ```

use std::sync::{Arc, Once};

use exgate_auth::nonce::NonceStore;
use exgate_auth::rate_limit::RateLimiter;
use exgate_auth::{RequestAuthenticator, StaticCredentialProvider};
use exgate_core::{AuthConfig, ManualClock};

static INIT: Once = Once::new();

/// Fixed start time for deterministic tests (2023-11-14T22:13:20Z).
pub const START_MS: i64 = 1_700_000_000_000;

/// API key configured on every test provider.
pub const API_KEY: &str = "test-api-key";

/// Secret configured on every test provider.
pub const SECRET: &str = "s3cr3t";

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Authenticator wired to fresh stores, with handles to its collaborators.
#[derive(Debug)]
pub struct Harness {
    /// The authenticator under test.
    pub auth: RequestAuthenticator,
    /// Clock shared by every component.
    pub clock: Arc<ManualClock>,
    /// Provider holding [`API_KEY`] / [`SECRET`].
    pub provider: Arc<StaticCredentialProvider>,
}

/// Build a [`Harness`] from `config`.
#[must_use]
pub fn harness(config: &AuthConfig) -> Harness {
    init_tracing();

    let clock = Arc::new(ManualClock::new(START_MS));
    let provider = Arc::new(StaticCredentialProvider::new(API_KEY, SECRET));
    let nonces = Arc::new(NonceStore::new(config.nonce_expiration(), clock.clone()));
    let limiter = Arc::new(RateLimiter::new(
        config.requests_per_minute,
        config.requests_per_hour,
        clock.clone(),
    ));
    let auth = RequestAuthenticator::new(config, provider.clone(), nonces, limiter, clock.clone())
        .expect("test config is valid");

    Harness {
        auth,
        clock,
        provider,
    }
}

/// [`harness`] with the default configuration.
#[must_use]
pub fn default_harness() -> Harness {
    harness(&AuthConfig::default())
}

mod test_concurrency;
mod test_lifecycle;
mod test_replay;
mod test_signing;

//! Owned lifecycle for the authentication layer.
//!
//! [`AuthContext`] owns the nonce table, the rate table, the authenticator
//! built on them, and the two background sweepers. Create one with
//! [`AuthContext::init`] inside a tokio runtime and stop it with
//! [`AuthContext::shutdown`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use exgate_core::{AuthConfig, Clock};
use parking_lot::Mutex;
use tracing::info;

use crate::authenticator::RequestAuthenticator;
use crate::credentials::CredentialProvider;
use crate::error::AuthResult;
use crate::key_lifecycle::KeyExpirationInfo;
use crate::maintenance::{PeriodicTask, StopSignal};
use crate::nonce::{NonceStats, NonceStore};
use crate::rate_limit::{RateLimiter, RateLimiterStats};

/// Running authentication layer.
pub struct AuthContext {
    config: AuthConfig,
    authenticator: Arc<RequestAuthenticator>,
    nonces: Arc<NonceStore>,
    rate_limiter: Arc<RateLimiter>,
    provider: Arc<dyn CredentialProvider>,
    stop: StopSignal,
    tasks: Mutex<Vec<PeriodicTask>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("nonces", &self.nonces)
            .field("rate_limiter", &self.rate_limiter)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    /// Validate `config`, build every component, and start the nonce evictor
    /// and rate-window sweeper.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::Config`] for out-of-range settings or
    /// [`crate::AuthError::Pattern`] for an invalid forbidden pattern.
    pub fn init(
        config: AuthConfig,
        provider: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        config.validate()?;

        let nonces = Arc::new(NonceStore::new(config.nonce_expiration(), clock.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.requests_per_minute,
            config.requests_per_hour,
            clock.clone(),
        ));
        let authenticator = Arc::new(RequestAuthenticator::new(
            &config,
            provider.clone(),
            nonces.clone(),
            rate_limiter.clone(),
            clock,
        )?);

        let stop = StopSignal::new();
        let evictor = {
            let nonces = nonces.clone();
            PeriodicTask::spawn(
                "nonce-evictor",
                config.nonce_cleanup_interval(),
                stop.listener(),
                move || {
                    nonces.evict_expired();
                },
            )
        };
        let sweeper = {
            let rate_limiter = rate_limiter.clone();
            PeriodicTask::spawn(
                "rate-window-sweeper",
                config.rate_limit_cleanup_interval(),
                stop.listener(),
                move || {
                    rate_limiter.sweep();
                },
            )
        };

        info!(
            nonce_expiration_secs = config.nonce_expiration_secs,
            rate_limit_enabled = config.rate_limit_enabled,
            requests_per_minute = config.requests_per_minute,
            requests_per_hour = config.requests_per_hour,
            "Auth context initialized"
        );

        Ok(Self {
            config,
            authenticator,
            nonces,
            rate_limiter,
            provider,
            stop,
            tasks: Mutex::new(vec![evictor, sweeper]),
            closed: AtomicBool::new(false),
        })
    }

    /// Stop the background tasks, drop every nonce, and release credentials.
    ///
    /// Each task gets up to the configured shutdown timeout to exit before it
    /// is aborted. Calling this more than once has no further effect.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Auth context shutting down");

        self.stop.fire();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let timeout = self.config.shutdown_timeout();
        let mut clean = 0usize;
        for task in tasks {
            if task.join(timeout).await {
                clean += 1;
            }
        }

        self.nonces.clear();
        self.provider.release_credentials();
        info!(tasks_joined = clean, "Auth context shut down");
    }

    /// Whether [`Self::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The request authenticator.
    #[must_use]
    pub fn authenticator(&self) -> &Arc<RequestAuthenticator> {
        &self.authenticator
    }

    /// Issue a nonce for a client to attach to its next request.
    #[must_use]
    pub fn issue_nonce(&self) -> String {
        self.nonces.issue()
    }

    /// Nonce table occupancy.
    #[must_use]
    pub fn nonce_stats(&self) -> NonceStats {
        self.nonces.stats()
    }

    /// Rate table occupancy.
    #[must_use]
    pub fn rate_limit_stats(&self) -> RateLimiterStats {
        self.rate_limiter.stats()
    }

    /// Rotation status of the configured key.
    #[must_use]
    pub fn key_status(&self, last_rotation: DateTime<Utc>) -> KeyExpirationInfo {
        self.authenticator.key_status(last_rotation)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

//! Outbound request signing and the inbound validation pipeline.
//!
//! Inbound requests pass through these phases, and the first failure decides
//! the verdict:
//!
//! ```text
//! Start -> NonceChecked -> TimestampChecked -> IdentityChecked
//!       -> RateChecked -> SignatureChecked -> Valid
//! ```
//!
//! The nonce phase runs only when the caller supplies a nonce, and the rate
//! phase only when rate limiting is enabled. A request is charged against the
//! quota only once its signature verifies. Credential or crypto faults while
//! validating are logged and reported as `VALIDATION_ERROR`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use exgate_core::{AuthConfig, Clock};
use http::HeaderMap;
use tracing::{debug, error, info, warn};

use crate::canonical::{canonical_post_payload, canonical_query};
use crate::credentials::CredentialProvider;
use crate::error::{AuthError, AuthResult};
use crate::headers::{
    API_KEY_HEADER, AuthHeaders, RECV_WINDOW_HEADER, SIGN_HEADER, TIMESTAMP_HEADER,
};
use crate::integrity::IntegrityChecker;
use crate::key_lifecycle::{KeyExpirationInfo, KeyRotationPolicy};
use crate::nonce::NonceStore;
use crate::rate_limit::RateLimiter;
use crate::signature::{SignatureEngine, constant_time_eq};
use crate::verdict::{RejectReason, ValidationPhase, ValidationVerdict};

/// Request material covered by a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPayload {
    /// Query parameters of a read request.
    Get(Vec<(String, String)>),
    /// Raw JSON body of a write request.
    Post(String),
}

/// Request received by the gateway.
pub type InboundRequest = RequestPayload;

/// Request sent to the exchange.
pub type OutboundRequest = RequestPayload;

impl RequestPayload {
    /// Build a GET payload from any key/value pairs.
    pub fn get<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Get(
            params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a POST payload.
    pub fn post(body: impl Into<String>) -> Self {
        Self::Post(body.into())
    }

    fn method(&self) -> &'static str {
        match self {
            Self::Get(_) => "GET",
            Self::Post(_) => "POST",
        }
    }
}

/// A failed phase, with the last phase that passed.
struct Rejection {
    passed: ValidationPhase,
    reason: RejectReason,
}

impl Rejection {
    fn new(passed: ValidationPhase, reason: RejectReason) -> Self {
        Self { passed, reason }
    }
}

/// Signs outbound requests and validates inbound ones.
pub struct RequestAuthenticator {
    provider: Arc<dyn CredentialProvider>,
    nonces: Arc<NonceStore>,
    rate_limiter: Arc<RateLimiter>,
    rate_limit_enabled: bool,
    integrity: IntegrityChecker,
    engine: SignatureEngine,
    rotation: KeyRotationPolicy,
    clock: Arc<dyn Clock>,
    timestamp_tolerance_ms: u64,
    recv_window_ms: i64,
}

impl std::fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthenticator")
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("timestamp_tolerance_ms", &self.timestamp_tolerance_ms)
            .field("recv_window_ms", &self.recv_window_ms)
            .finish_non_exhaustive()
    }
}

impl RequestAuthenticator {
    /// Wire an authenticator over shared nonce and rate tables.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Pattern`] if a configured forbidden pattern does
    /// not compile.
    pub fn new(
        config: &AuthConfig,
        provider: Arc<dyn CredentialProvider>,
        nonces: Arc<NonceStore>,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let integrity = IntegrityChecker::new(
            config.max_payload_bytes,
            config.max_params,
            &config.forbidden_patterns,
        )?;

        Ok(Self {
            provider,
            nonces,
            rate_limiter,
            rate_limit_enabled: config.rate_limit_enabled,
            integrity,
            engine: SignatureEngine,
            rotation: KeyRotationPolicy::new(config.key_rotation_days, config.key_rotation_warn_days),
            clock,
            timestamp_tolerance_ms: u64::try_from(config.timestamp_tolerance_ms).unwrap_or(0),
            recv_window_ms: config.recv_window_ms,
        })
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Sign a GET request for the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialUnavailable`] if credentials are missing
    /// or [`AuthError::InvalidKey`] if the secret is blank.
    pub fn sign_for_get<I, K, V>(&self, params: I) -> AuthResult<AuthHeaders>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let api_key = self.provider.api_key()?;
        let secret = self.provider.secret_key()?;
        let timestamp = self.clock.now_millis();
        let signature = self.engine.sign_get(secret, timestamp, params)?;

        info!(api_key = %api_key, timestamp, "Signed outbound GET request");
        Ok(AuthHeaders::new(api_key, timestamp, signature, self.recv_window_ms))
    }

    /// Sign a POST request for the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialUnavailable`] if credentials are missing
    /// or [`AuthError::InvalidKey`] if the secret is blank.
    pub fn sign_for_post(&self, body: &str) -> AuthResult<AuthHeaders> {
        let api_key = self.provider.api_key()?;
        let secret = self.provider.secret_key()?;
        let timestamp = self.clock.now_millis();
        let signature = self.engine.sign_post(secret, timestamp, body)?;

        info!(api_key = %api_key, timestamp, body_len = body.len(), "Signed outbound POST request");
        Ok(AuthHeaders::new(api_key, timestamp, signature, self.recv_window_ms))
    }

    /// Sign an outbound request according to its method.
    ///
    /// # Errors
    ///
    /// See [`Self::sign_for_get`] and [`Self::sign_for_post`].
    pub fn sign_outbound(&self, request: &OutboundRequest) -> AuthResult<AuthHeaders> {
        match request {
            RequestPayload::Get(params) => {
                self.sign_for_get(params.iter().map(|(k, v)| (k, v)))
            }
            RequestPayload::Post(body) => self.sign_for_post(body),
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Validate an inbound request whose headers are already parsed.
    ///
    /// When `nonce` is supplied it is consumed, so a rejected request still
    /// burns its nonce.
    pub fn validate_inbound(
        &self,
        headers: &AuthHeaders,
        request: &InboundRequest,
        nonce: Option<&str>,
    ) -> ValidationVerdict {
        match self.run_pipeline(headers, request, nonce) {
            Ok(()) => {
                debug!(
                    api_key = %headers.api_key(),
                    method = request.method(),
                    phase = %ValidationPhase::Valid,
                    "Inbound request validated"
                );
                ValidationVerdict::Valid
            }
            Err(rejection) => {
                warn!(
                    api_key = %headers.api_key(),
                    method = request.method(),
                    passed = %rejection.passed,
                    code = rejection.reason.code(),
                    "Inbound request rejected"
                );
                ValidationVerdict::Invalid(rejection.reason)
            }
        }
    }

    /// Parse the `X-BAPI-*` headers from `headers` and validate the request.
    ///
    /// A missing or malformed header is rejected with the code of the phase
    /// that would have read it, before any nonce is consumed.
    pub fn validate_http(
        &self,
        headers: &HeaderMap,
        request: &InboundRequest,
        nonce: Option<&str>,
    ) -> ValidationVerdict {
        match AuthHeaders::from_header_map(headers) {
            Ok(parsed) => self.validate_inbound(&parsed, request, nonce),
            Err(e) => {
                let reason = header_error_reason(&e);
                warn!(error = %e, code = reason.code(), "Inbound request has malformed auth headers");
                ValidationVerdict::Invalid(reason)
            }
        }
    }

    /// Whether `timestamp` lies within the tolerance of the current time.
    #[must_use]
    pub fn is_timestamp_valid(&self, timestamp: i64) -> bool {
        self.clock.now_millis().abs_diff(timestamp) <= self.timestamp_tolerance_ms
    }

    /// Rotation status of the configured key, last rotated at `last_rotation`.
    #[must_use]
    pub fn key_status(&self, last_rotation: DateTime<Utc>) -> KeyExpirationInfo {
        let info = self.rotation.evaluate(last_rotation, self.clock.now());
        if info.should_rotate {
            warn!(
                days_until_expiration = info.days_until_expiration,
                expired = info.is_expired,
                "API key should be rotated"
            );
        }
        info
    }

    /// Nonce store shared with this authenticator.
    #[must_use]
    pub fn nonces(&self) -> &Arc<NonceStore> {
        &self.nonces
    }

    /// Rate limiter shared with this authenticator.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Credential provider backing this authenticator.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn CredentialProvider> {
        &self.provider
    }

    fn run_pipeline(
        &self,
        headers: &AuthHeaders,
        request: &InboundRequest,
        nonce: Option<&str>,
    ) -> Result<(), Rejection> {
        if nonce.is_some_and(|n| !self.nonces.consume(n)) {
            return Err(Rejection::new(ValidationPhase::Start, RejectReason::InvalidNonce));
        }
        debug!(phase = %ValidationPhase::NonceChecked, "Validation phase passed");

        if !self.is_timestamp_valid(headers.timestamp()) {
            return Err(Rejection::new(
                ValidationPhase::NonceChecked,
                RejectReason::InvalidTimestamp,
            ));
        }
        debug!(phase = %ValidationPhase::TimestampChecked, "Validation phase passed");

        let expected_key = self.provider.api_key().map_err(|e| {
            error!(error = %e, "Credential lookup failed during validation");
            Rejection::new(ValidationPhase::TimestampChecked, RejectReason::ValidationError)
        })?;
        if !constant_time_eq(headers.api_key().as_bytes(), expected_key.as_bytes()) {
            return Err(Rejection::new(
                ValidationPhase::TimestampChecked,
                RejectReason::InvalidApiKey,
            ));
        }
        debug!(phase = %ValidationPhase::IdentityChecked, "Validation phase passed");

        // Committed once the signature verifies; dropping it returns the slot.
        let reservation = if self.rate_limit_enabled {
            match self.rate_limiter.try_reserve(headers.api_key()) {
                Some(reservation) => Some(reservation),
                None => {
                    return Err(Rejection::new(
                        ValidationPhase::IdentityChecked,
                        RejectReason::RateLimitExceeded,
                    ));
                }
            }
        } else {
            None
        };
        debug!(phase = %ValidationPhase::RateChecked, "Validation phase passed");

        self.verify_signature(headers, request)?;
        if let Some(reservation) = reservation {
            reservation.commit();
        }
        debug!(phase = %ValidationPhase::SignatureChecked, "Validation phase passed");

        let integrity = match request {
            RequestPayload::Get(params) => self.integrity.check_params(params),
            RequestPayload::Post(body) => self.integrity.check_body(body),
        };
        if let Err(violation) = integrity {
            debug!(violation = ?violation, "Integrity check failed");
            return Err(Rejection::new(
                ValidationPhase::SignatureChecked,
                RejectReason::DataIntegrityFailed,
            ));
        }

        Ok(())
    }

    fn verify_signature(
        &self,
        headers: &AuthHeaders,
        request: &InboundRequest,
    ) -> Result<(), Rejection> {
        let fault = |e: AuthError| {
            error!(error = %e, "Signature verification fault");
            Rejection::new(ValidationPhase::RateChecked, RejectReason::ValidationError)
        };

        let secret = self.provider.secret_key().map_err(fault)?;
        let message = match request {
            RequestPayload::Get(params) => canonical_query(params.iter().map(|(k, v)| (k, v))),
            RequestPayload::Post(body) => canonical_post_payload(headers.timestamp(), body),
        };

        if self
            .engine
            .validate(secret, &message, headers.signature())
            .map_err(fault)?
        {
            Ok(())
        } else {
            Err(Rejection::new(
                ValidationPhase::RateChecked,
                RejectReason::InvalidSignature,
            ))
        }
    }
}

/// Map a header parsing failure to the phase that would have read the header.
fn header_error_reason(err: &AuthError) -> RejectReason {
    match err {
        AuthError::MissingHeader(name) | AuthError::InvalidHeader(name) => match *name {
            API_KEY_HEADER => RejectReason::InvalidApiKey,
            TIMESTAMP_HEADER | RECV_WINDOW_HEADER => RejectReason::InvalidTimestamp,
            SIGN_HEADER => RejectReason::InvalidSignature,
            _ => RejectReason::ValidationError,
        },
        _ => RejectReason::ValidationError,
    }
}

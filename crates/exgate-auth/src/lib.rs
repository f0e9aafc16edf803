//! HMAC-SHA256 request authentication and replay protection for exgate.
//!
//! This crate signs outbound exchange requests and validates inbound gateway
//! requests. Signatures are `Base64(HMAC-SHA256(secret, payload))` over a
//! canonical payload: the sorted query string for reads, the timestamp
//! followed by the raw body for writes.
//!
//! # Overview
//!
//! Inbound validation runs a fixed pipeline (nonce, timestamp, identity,
//! rate limit, signature, integrity) and always ends in a
//! [`ValidationVerdict`]. Expected failures never surface as errors, and no
//! verdict or log line ever carries secret material.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use exgate_auth::{InboundRequest, RequestAuthenticator, StaticCredentialProvider};
//! use exgate_auth::nonce::NonceStore;
//! use exgate_auth::rate_limit::RateLimiter;
//! use exgate_core::{AuthConfig, Clock, SystemClock};
//!
//! let config = AuthConfig::default();
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let auth = RequestAuthenticator::new(
//!     &config,
//!     Arc::new(StaticCredentialProvider::new("api-key", "s3cr3t")),
//!     Arc::new(NonceStore::new(config.nonce_expiration(), clock.clone())),
//!     Arc::new(RateLimiter::new(60, 1000, clock.clone())),
//!     clock,
//! )
//! .unwrap();
//!
//! let request = InboundRequest::get([("category", "spot"), ("symbol", "BTCUSDT")]);
//! let headers = auth.sign_outbound(&request).unwrap();
//! assert!(auth.validate_inbound(&headers, &request, None).is_valid());
//! ```
//!
//! # Modules
//!
//! - [`authenticator`] - Outbound signing and the inbound validation pipeline
//! - [`canonical`] - Canonical GET and POST signing payloads
//! - [`context`] - Owned lifecycle with background sweepers
//! - [`credentials`] - Credential provider trait, env and in-memory providers
//! - [`error`] - Authentication error types
//! - [`headers`] - `X-BAPI-*` header set
//! - [`integrity`] - Payload size and content checks
//! - [`key_lifecycle`] - Key rotation policy
//! - [`maintenance`] - Periodic task supervision
//! - [`nonce`] - Single-use nonce store
//! - [`rate_limit`] - Sliding-window rate limiter
//! - [`signature`] - HMAC-SHA256 signing and constant-time verification
//! - [`verdict`] - Validation verdicts and reject reasons

pub mod authenticator;
pub mod canonical;
pub mod context;
pub mod credentials;
pub mod error;
pub mod headers;
pub mod integrity;
pub mod key_lifecycle;
pub mod maintenance;
pub mod nonce;
pub mod rate_limit;
pub mod signature;
pub mod verdict;

pub use authenticator::{InboundRequest, OutboundRequest, RequestAuthenticator, RequestPayload};
pub use context::AuthContext;
pub use credentials::{
    CredentialProvider, EnvCredentialProvider, SecretKey, StaticCredentialProvider,
};
pub use error::{AuthError, AuthResult};
pub use headers::AuthHeaders;
pub use key_lifecycle::{KeyExpirationInfo, KeyRotationPolicy};
pub use signature::SignatureEngine;
pub use verdict::{RejectReason, ValidationPhase, ValidationVerdict};

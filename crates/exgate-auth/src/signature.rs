//! HMAC-SHA256 request signing and verification.
//!
//! ```text
//! Signature = Base64(HMAC-SHA256(SecretKey, CanonicalPayload))
//! ```
//!
//! Every operation takes the [`SecretKey`] by value. The key is dropped, and
//! therefore zeroed, before the operation returns, whether it succeeds or fails.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{canonical_post_payload, canonical_query};
use crate::credentials::SecretKey;
use crate::error::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Stateless HMAC-SHA256 signer and verifier.
///
/// # Examples
///
/// ```
/// use exgate_auth::credentials::SecretKey;
/// use exgate_auth::signature::SignatureEngine;
///
/// let engine = SignatureEngine;
/// let signature = engine.sign(SecretKey::from("s3cr3t"), "payload").unwrap();
/// assert!(engine.validate(SecretKey::from("s3cr3t"), "payload", &signature).unwrap());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine;

impl SignatureEngine {
    /// Sign `message` with `secret`, returning the padded standard Base64 MAC.
    ///
    /// An empty message is permitted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the secret is empty or blank.
    pub fn sign(&self, secret: SecretKey, message: &str) -> AuthResult<String> {
        let mac = compute_mac(&secret, message.as_bytes())?;
        drop(secret);
        Ok(BASE64.encode(mac))
    }

    /// Sign a GET request over its canonical (sorted) query string.
    ///
    /// The timestamp travels in the `X-BAPI-TIMESTAMP` header and is not part
    /// of the signed string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the secret is empty or blank.
    pub fn sign_get<I, K, V>(&self, secret: SecretKey, timestamp: i64, params: I) -> AuthResult<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = canonical_query(params);
        debug!(timestamp, query_len = query.len(), "Signing GET request");
        self.sign(secret, &query)
    }

    /// Sign a POST request over `"{timestamp}{body}"`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the secret is empty or blank.
    pub fn sign_post(&self, secret: SecretKey, timestamp: i64, body: &str) -> AuthResult<String> {
        debug!(timestamp, body_len = body.len(), "Signing POST request");
        self.sign(secret, &canonical_post_payload(timestamp, body))
    }

    /// Recompute the signature of `message` and compare it with `expected` in
    /// constant time.
    ///
    /// A malformed or wrong-length `expected` value is simply a mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the secret is empty or blank.
    pub fn validate(&self, secret: SecretKey, message: &str, expected: &str) -> AuthResult<bool> {
        let computed = self.sign(secret, message)?;
        Ok(constant_time_eq(computed.as_bytes(), expected.as_bytes()))
    }
}

/// Compare two byte strings without short-circuiting on the first difference.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn compute_mac(secret: &SecretKey, message: &[u8]) -> AuthResult<Vec<u8>> {
    if secret.is_blank() {
        return Err(AuthError::InvalidKey);
    }
    let mut mac = HmacSha256::new_from_slice(secret.expose())
        .map_err(|e| AuthError::Crypto(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

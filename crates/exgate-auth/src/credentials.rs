//! Credential provider trait and implementations.
//!
//! This module defines [`SecretKey`], the only type secret material ever
//! travels in, and the [`CredentialProvider`] trait that hands out the API key
//! and a fresh copy of the secret for each signing or validation operation.
//!
//! A [`SecretKey`] owns its bytes and wipes them when dropped, so whichever
//! scope acquired the secret last is the one that zeroes it, on every exit
//! path including early returns and errors.

use std::fmt;

use parking_lot::RwLock;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{AuthError, AuthResult};

/// Environment variable holding the exchange API key.
pub const API_KEY_ENV: &str = "BYBIT_API_KEY";

/// Environment variable holding the exchange secret key.
pub const SECRET_KEY_ENV: &str = "BYBIT_SECRET_KEY";

/// Owned, mutable secret key buffer that is zeroed on drop.
///
/// There is deliberately no `Clone`, `Display`, or conversion back into a
/// `String`. `Debug` output is redacted.
pub struct SecretKey(Zeroizing<Vec<u8>>);

impl SecretKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Borrow the key bytes for a cryptographic operation.
    ///
    /// Never log or persist the returned slice.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        &self.0
    }

    /// Whether the key is empty or consists only of ASCII whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(u8::is_ascii_whitespace)
    }

    /// Zero the backing buffer immediately instead of waiting for drop.
    pub fn wipe(&mut self) {
        self.0.zeroize();
    }
}

impl From<String> for SecretKey {
    /// Takes ownership of the string's buffer; no intermediate copy is made.
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&str> for SecretKey {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for SecretKey {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Source of the API key and secret key used to sign and validate requests.
///
/// Implementations may back this with environment variables, a secrets
/// manager, or any other credential store.
pub trait CredentialProvider: Send + Sync {
    /// Retrieve the API key (public identity, safe to log).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialUnavailable`] if no non-blank key is configured.
    fn api_key(&self) -> AuthResult<String>;

    /// Retrieve a fresh copy of the secret key.
    ///
    /// The caller owns the returned buffer and it is wiped when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialUnavailable`] if no non-blank secret is configured.
    fn secret_key(&self) -> AuthResult<SecretKey>;

    /// Purge any secret material cached in process memory.
    ///
    /// Stateless providers have nothing to purge.
    fn release_credentials(&self) {}
}

/// Credential provider that reads environment variables on every call.
///
/// Nothing is cached, so [`CredentialProvider::release_credentials`] is a no-op.
///
/// # Examples
///
/// ```
/// use exgate_auth::credentials::{CredentialProvider, EnvCredentialProvider};
///
/// let provider = EnvCredentialProvider::with_vars("EXGATE_DOC_UNSET_KEY", "EXGATE_DOC_UNSET_SECRET");
/// assert!(provider.api_key().is_err());
/// ```
#[derive(Clone)]
pub struct EnvCredentialProvider {
    api_key_var: String,
    secret_key_var: String,
    lookup: fn(&str) -> Option<String>,
}

impl EnvCredentialProvider {
    /// Read `BYBIT_API_KEY` and `BYBIT_SECRET_KEY`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_vars(API_KEY_ENV, SECRET_KEY_ENV)
    }

    /// Read credentials from custom variable names.
    pub fn with_vars(api_key_var: impl Into<String>, secret_key_var: impl Into<String>) -> Self {
        Self {
            api_key_var: api_key_var.into(),
            secret_key_var: secret_key_var.into(),
            lookup: |name| std::env::var(name).ok(),
        }
    }

    #[cfg(test)]
    fn with_lookup(lookup: fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            ..Self::new()
        }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCredentialProvider")
            .field("api_key_var", &self.api_key_var)
            .field("secret_key_var", &self.secret_key_var)
            .finish_non_exhaustive()
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn api_key(&self) -> AuthResult<String> {
        (self.lookup)(&self.api_key_var)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AuthError::CredentialUnavailable(self.api_key_var.clone()))
    }

    fn secret_key(&self) -> AuthResult<SecretKey> {
        let secret = (self.lookup)(&self.secret_key_var)
            .map(SecretKey::from)
            .ok_or_else(|| AuthError::CredentialUnavailable(self.secret_key_var.clone()))?;
        if secret.is_blank() {
            return Err(AuthError::CredentialUnavailable(self.secret_key_var.clone()));
        }
        Ok(secret)
    }
}

/// Credential provider holding one key pair in process memory.
///
/// Suitable for tests and for wiring a key pair fetched from an external
/// secrets service. [`CredentialProvider::release_credentials`] wipes the
/// cached secret; afterwards both getters fail.
pub struct StaticCredentialProvider {
    inner: RwLock<Option<(String, SecretKey)>>,
}

impl StaticCredentialProvider {
    /// Cache the given key pair.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<SecretKey>) -> Self {
        Self {
            inner: RwLock::new(Some((api_key.into(), secret_key.into()))),
        }
    }

    /// Whether the cached credentials have been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.read().is_none()
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.read();
        f.debug_struct("StaticCredentialProvider")
            .field("api_key", &guard.as_ref().map(|(key, _)| key.as_str()))
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn api_key(&self) -> AuthResult<String> {
        self.inner
            .read()
            .as_ref()
            .map(|(key, _)| key.clone())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AuthError::CredentialUnavailable("api key".to_owned()))
    }

    fn secret_key(&self) -> AuthResult<SecretKey> {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some((_, secret)) if !secret.is_blank() => Ok(SecretKey::from(secret.expose())),
            _ => Err(AuthError::CredentialUnavailable("secret key".to_owned())),
        }
    }

    fn release_credentials(&self) {
        // Dropping the cached SecretKey zeroes it.
        self.inner.write().take();
    }
}

//! Structural and content checks on inbound payloads.

use regex::RegexSet;

use crate::error::{AuthError, AuthResult};

/// Why a payload failed the integrity scan. Only logged; clients see a single
/// `DATA_INTEGRITY_FAILED` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Body exceeds the configured size limit.
    PayloadTooLarge,
    /// More query parameters than allowed.
    TooManyParams,
    /// A query parameter has an empty key.
    EmptyKey,
    /// NUL or another disallowed control character.
    ControlCharacter,
    /// Content matched a forbidden pattern.
    ForbiddenPattern,
}

/// Compiled integrity rules.
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    max_payload_bytes: usize,
    max_params: usize,
    forbidden: RegexSet,
}

impl IntegrityChecker {
    /// Compile the forbidden patterns.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Pattern`] if a pattern is not a valid regex.
    pub fn new<I, S>(max_payload_bytes: usize, max_params: usize, patterns: I) -> AuthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let forbidden =
            RegexSet::new(patterns).map_err(|e| AuthError::Pattern(e.to_string()))?;
        Ok(Self {
            max_payload_bytes,
            max_params,
            forbidden,
        })
    }

    /// Check a POST body.
    ///
    /// # Errors
    ///
    /// Returns the first [`IntegrityViolation`] found.
    pub fn check_body(&self, body: &str) -> Result<(), IntegrityViolation> {
        if body.len() > self.max_payload_bytes {
            return Err(IntegrityViolation::PayloadTooLarge);
        }
        self.check_text(body)
    }

    /// Check GET parameters.
    ///
    /// # Errors
    ///
    /// Returns the first [`IntegrityViolation`] found.
    pub fn check_params<K, V>(&self, params: &[(K, V)]) -> Result<(), IntegrityViolation>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if params.len() > self.max_params {
            return Err(IntegrityViolation::TooManyParams);
        }
        let mut total = 0usize;
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key.is_empty() {
                return Err(IntegrityViolation::EmptyKey);
            }
            total += key.len() + value.len() + 1;
            if total > self.max_payload_bytes {
                return Err(IntegrityViolation::PayloadTooLarge);
            }
            self.check_text(key)?;
            self.check_text(value)?;
        }
        Ok(())
    }

    fn check_text(&self, text: &str) -> Result<(), IntegrityViolation> {
        if text
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
        {
            return Err(IntegrityViolation::ControlCharacter);
        }
        if self.forbidden.is_match(text) {
            return Err(IntegrityViolation::ForbiddenPattern);
        }
        Ok(())
    }
}

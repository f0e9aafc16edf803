//! Inbound validation outcomes.

use std::fmt;

use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;

/// Why an inbound request was rejected.
///
/// Each reason carries a stable wire code and a deliberately coarse message
/// that never discloses which part of a secret comparison failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Nonce missing, already consumed, expired, or never issued.
    InvalidNonce,
    /// Timestamp outside the accepted tolerance.
    InvalidTimestamp,
    /// API key does not match the configured identity.
    InvalidApiKey,
    /// Signature does not match the request.
    InvalidSignature,
    /// Payload failed a structural or content check.
    DataIntegrityFailed,
    /// Per-identity request quota exhausted.
    RateLimitExceeded,
    /// Internal fault while validating.
    ValidationError,
}

impl RejectReason {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidNonce => "INVALID_NONCE",
            Self::InvalidTimestamp => "INVALID_TIMESTAMP",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::DataIntegrityFailed => "DATA_INTEGRITY_FAILED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ValidationError => "VALIDATION_ERROR",
        }
    }

    /// Human-readable message safe to return to a client.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidNonce => "Invalid or expired nonce",
            Self::InvalidTimestamp => "Request timestamp outside the allowed window",
            Self::InvalidApiKey => "Invalid API key",
            Self::InvalidSignature => "Invalid signature",
            Self::DataIntegrityFailed => "Request data failed integrity checks",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::ValidationError => "Request validation failed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// States of the inbound validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationPhase {
    /// Nothing checked yet.
    Start,
    /// Nonce consumed (or none supplied).
    NonceChecked,
    /// Timestamp within tolerance.
    TimestampChecked,
    /// API key matches.
    IdentityChecked,
    /// Quota available.
    RateChecked,
    /// Signature verified.
    SignatureChecked,
    /// All checks passed.
    Valid,
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::NonceChecked => "nonce_checked",
            Self::TimestampChecked => "timestamp_checked",
            Self::IdentityChecked => "identity_checked",
            Self::RateChecked => "rate_checked",
            Self::SignatureChecked => "signature_checked",
            Self::Valid => "valid",
        };
        f.write_str(name)
    }
}

/// Accept/reject result of inbound validation.
///
/// Serializes as `{"valid":true}` or
/// `{"valid":false,"code":"INVALID_NONCE","message":"..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationVerdict {
    /// The request passed every check.
    Valid,
    /// The request was rejected.
    Invalid(RejectReason),
}

impl ValidationVerdict {
    /// Whether the request was accepted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(*reason),
        }
    }

    /// Rejection code, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&'static str> {
        self.reason().map(RejectReason::code)
    }
}

impl Serialize for ValidationVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid => {
                let mut s = serializer.serialize_struct("ValidationVerdict", 1)?;
                s.serialize_field("valid", &true)?;
                s.end()
            }
            Self::Invalid(reason) => {
                let mut s = serializer.serialize_struct("ValidationVerdict", 3)?;
                s.serialize_field("valid", &false)?;
                s.serialize_field("code", reason.code())?;
                s.serialize_field("message", reason.message())?;
                s.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_valid_verdict() {
        let json = serde_json::to_string(&ValidationVerdict::Valid).unwrap();
        assert_eq!(json, r#"{"valid":true}"#);
    }

    #[test]
    fn test_should_serialize_invalid_verdict() {
        let verdict = ValidationVerdict::Invalid(RejectReason::InvalidNonce);
        let json = serde_json::to_value(verdict).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["code"], "INVALID_NONCE");
        assert_eq!(json["message"], "Invalid or expired nonce");
    }

    #[test]
    fn test_should_expose_reason_and_code() {
        let verdict = ValidationVerdict::Invalid(RejectReason::RateLimitExceeded);
        assert!(!verdict.is_valid());
        assert_eq!(verdict.reason(), Some(RejectReason::RateLimitExceeded));
        assert_eq!(verdict.error_code(), Some("RATE_LIMIT_EXCEEDED"));
        assert_eq!(ValidationVerdict::Valid.error_code(), None);
    }

    #[test]
    fn test_should_order_phases() {
        assert!(ValidationPhase::Start < ValidationPhase::NonceChecked);
        assert!(ValidationPhase::RateChecked < ValidationPhase::SignatureChecked);
        assert_eq!(ValidationPhase::IdentityChecked.to_string(), "identity_checked");
    }
}

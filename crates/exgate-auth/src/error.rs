//! Error types for request signing and credential access.
//!
//! Expected validation outcomes are never errors: they are reported as a
//! [`ValidationVerdict`](crate::verdict::ValidationVerdict). [`AuthError`]
//! covers the failures that abort an operation outright.

/// Errors that can occur while signing requests or reading credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The supplied configuration is out of range.
    #[error(transparent)]
    Config(#[from] exgate_core::ExgateError),

    /// The credential store has no value, or a blank value, for the named item.
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// The secret key is empty or consists only of whitespace.
    #[error("Invalid signing key")]
    InvalidKey,

    /// A required authentication header is missing.
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    /// An authentication header is present but cannot be parsed.
    #[error("Invalid header value: {0}")]
    InvalidHeader(&'static str),

    /// A forbidden-content pattern failed to compile.
    #[error("Invalid integrity pattern: {0}")]
    Pattern(String),

    /// The underlying cryptographic primitive failed.
    #[error("Cryptographic failure: {0}")]
    Crypto(String),
}

/// Convenience result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

//! Error types for the exgate core.

/// Core error type for exgate infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum ExgateError {
    /// A configuration value is out of its allowed range.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience result type for exgate core operations.
pub type ExgateResult<T> = Result<T, ExgateError>;

//! Exchange authentication headers.

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AuthError, AuthResult};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-BAPI-API-KEY";
/// Header carrying the request timestamp in epoch milliseconds.
pub const TIMESTAMP_HEADER: &str = "X-BAPI-TIMESTAMP";
/// Header carrying the Base64 HMAC-SHA256 signature.
pub const SIGN_HEADER: &str = "X-BAPI-SIGN";
/// Header carrying the receive window in milliseconds.
pub const RECV_WINDOW_HEADER: &str = "X-BAPI-RECV-WINDOW";

/// Receive window used when none is supplied.
pub const DEFAULT_RECV_WINDOW_MS: i64 = 5000;

/// The four signed-request headers, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    api_key: String,
    timestamp: i64,
    signature: String,
    recv_window: i64,
}

impl AuthHeaders {
    /// Assemble a header set.
    pub fn new(
        api_key: impl Into<String>,
        timestamp: i64,
        signature: impl Into<String>,
        recv_window: i64,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            timestamp,
            signature: signature.into(),
            recv_window,
        }
    }

    /// API key (public identity).
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Timestamp in epoch milliseconds.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Base64 signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Receive window in milliseconds.
    #[must_use]
    pub fn recv_window(&self) -> i64 {
        self.recv_window
    }

    /// Render as a name-to-value map with exactly four entries.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (API_KEY_HEADER.to_owned(), self.api_key.clone()),
            (TIMESTAMP_HEADER.to_owned(), self.timestamp.to_string()),
            (SIGN_HEADER.to_owned(), self.signature.clone()),
            (RECV_WINDOW_HEADER.to_owned(), self.recv_window.to_string()),
        ])
    }

    /// Render as an [`http::HeaderMap`] ready to attach to an outbound request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeader`] if the API key contains bytes that
    /// are not valid in a header value.
    pub fn to_header_map(&self) -> AuthResult<HeaderMap> {
        let mut map = HeaderMap::with_capacity(4);
        map.insert(
            header_name(API_KEY_HEADER)?,
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| AuthError::InvalidHeader(API_KEY_HEADER))?,
        );
        map.insert(
            header_name(TIMESTAMP_HEADER)?,
            HeaderValue::from(self.timestamp),
        );
        map.insert(
            header_name(SIGN_HEADER)?,
            HeaderValue::from_str(&self.signature)
                .map_err(|_| AuthError::InvalidHeader(SIGN_HEADER))?,
        );
        map.insert(
            header_name(RECV_WINDOW_HEADER)?,
            HeaderValue::from(self.recv_window),
        );
        Ok(map)
    }

    /// Parse the authentication headers of an inbound request.
    ///
    /// A missing receive window falls back to [`DEFAULT_RECV_WINDOW_MS`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingHeader`] or [`AuthError::InvalidHeader`]
    /// naming the first header that is absent or unparsable.
    pub fn from_header_map(headers: &HeaderMap) -> AuthResult<Self> {
        let api_key = required_str(headers, API_KEY_HEADER)?;
        let timestamp = required_str(headers, TIMESTAMP_HEADER)?
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidHeader(TIMESTAMP_HEADER))?;
        let signature = required_str(headers, SIGN_HEADER)?;
        let recv_window = match headers.get(RECV_WINDOW_HEADER) {
            None => DEFAULT_RECV_WINDOW_MS,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .ok_or(AuthError::InvalidHeader(RECV_WINDOW_HEADER))?,
        };

        Ok(Self::new(api_key, timestamp, signature, recv_window))
    }
}

/// Normalize one of the header constants into an [`HeaderName`].
fn header_name(name: &'static str) -> AuthResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| AuthError::InvalidHeader(name))
}

/// Read a header as trimmed, non-empty UTF-8.
fn required_str<'a>(headers: &'a HeaderMap, name: &'static str) -> AuthResult<&'a str> {
    let value = headers.get(name).ok_or(AuthError::MissingHeader(name))?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidHeader(name))?
        .trim();
    if value.is_empty() {
        return Err(AuthError::MissingHeader(name));
    }
    Ok(value)
}

//! Canonical signing payloads.
//!
//! Both sides of a signed exchange must derive byte-identical strings from the
//! same request material:
//!
//! ```text
//! GET:  key1=value1&key2=value2      (keys ascending, no URL-encoding)
//! POST: {timestamp}{body}            (decimal millis, raw body, no separator)
//! ```

/// Build the canonical query string from request parameters.
///
/// Parameters are sorted by key in ascending byte order and joined as
/// `key=value` pairs with `&`. Values are used verbatim. Duplicate keys are
/// ordered by value so the result never depends on input iteration order.
///
/// # Examples
///
/// ```
/// use exgate_auth::canonical::canonical_query;
///
/// let query = canonical_query([("symbol", "BTCUSDT"), ("category", "spot")]);
/// assert_eq!(query, "category=spot&symbol=BTCUSDT");
/// ```
#[must_use]
pub fn canonical_query<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = params.into_iter().collect();
    pairs.sort_by(|(ka, va), (kb, vb)| {
        ka.as_ref()
            .cmp(kb.as_ref())
            .then_with(|| va.as_ref().cmp(vb.as_ref()))
    });

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical POST payload: the decimal timestamp followed by the body.
#[must_use]
pub fn canonical_post_payload(timestamp: i64, body: &str) -> String {
    format!("{timestamp}{body}")
}

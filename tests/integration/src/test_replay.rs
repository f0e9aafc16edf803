//! Replay, timestamp and rate-limit rejection tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use exgate_auth::{InboundRequest, RejectReason};
    use exgate_core::{AuthConfig, Clock};

    use crate::{START_MS, default_harness, harness};

    #[test]
    fn test_should_reject_replayed_nonce() {
        let h = default_harness();
        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let headers = h.auth.sign_outbound(&request).expect("sign");
        let nonce = h.auth.nonces().issue();

        assert!(h.auth.validate_inbound(&headers, &request, Some(&nonce)).is_valid());
        assert_eq!(
            h.auth
                .validate_inbound(&headers, &request, Some(&nonce))
                .reason(),
            Some(RejectReason::InvalidNonce)
        );
    }

    #[test]
    fn test_should_reject_unknown_and_expired_nonces_identically() {
        let h = default_harness();
        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let nonce = h.auth.nonces().issue();

        h.clock.advance(Duration::from_secs(301));
        let headers = h.auth.sign_outbound(&request).expect("sign");

        let expired = h.auth.validate_inbound(&headers, &request, Some(&nonce));
        let unknown = h
            .auth
            .validate_inbound(&headers, &request, Some("never-issued"));
        assert_eq!(expired, unknown);
        assert_eq!(expired.reason(), Some(RejectReason::InvalidNonce));
        assert!(h.auth.nonces().is_empty());
    }

    #[test]
    fn test_should_burn_nonce_on_rejected_request() {
        let h = default_harness();
        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let mut headers = h.auth.sign_outbound(&request).expect("sign");
        let nonce = h.auth.nonces().issue();

        h.clock.advance(Duration::from_secs(30));
        assert_eq!(
            h.auth
                .validate_inbound(&headers, &request, Some(&nonce))
                .reason(),
            Some(RejectReason::InvalidTimestamp)
        );

        headers = h.auth.sign_outbound(&request).expect("sign");
        assert_eq!(
            h.auth
                .validate_inbound(&headers, &request, Some(&nonce))
                .reason(),
            Some(RejectReason::InvalidNonce)
        );
    }

    #[test]
    fn test_should_apply_timestamp_tolerance() {
        let h = default_harness();
        let now = h.clock.now_millis();
        assert_eq!(now, START_MS);
        assert!(h.auth.is_timestamp_valid(now));
        assert!(!h.auth.is_timestamp_valid(now - 10_000));
        assert!(!h.auth.is_timestamp_valid(now + 10_000));
    }

    #[test]
    fn test_should_rate_limit_per_minute() {
        let config = AuthConfig::builder().requests_per_minute(3).build();
        let h = harness(&config);
        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let headers = h.auth.sign_outbound(&request).expect("sign");

        let results: Vec<bool> = (0..4)
            .map(|_| h.auth.validate_inbound(&headers, &request, None).is_valid())
            .collect();
        assert_eq!(results, [true, true, true, false]);
        assert_eq!(
            h.auth.validate_inbound(&headers, &request, None).reason(),
            Some(RejectReason::RateLimitExceeded)
        );
    }

    #[test]
    fn test_should_keep_quota_for_owner_after_forged_requests() {
        let config = AuthConfig::builder().requests_per_minute(3).build();
        let h = harness(&config);
        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let forged = exgate_auth::AuthHeaders::new(crate::API_KEY, START_MS, "Zm9yZ2Vk", 5000);

        for _ in 0..3 {
            assert_eq!(
                h.auth.validate_inbound(&forged, &request, None).reason(),
                Some(RejectReason::InvalidSignature)
            );
        }

        let signed = h.auth.sign_outbound(&request).expect("sign");
        let results: Vec<bool> = (0..4)
            .map(|_| h.auth.validate_inbound(&signed, &request, None).is_valid())
            .collect();
        assert_eq!(results, [true, true, true, false]);
    }

    #[test]
    fn test_should_not_charge_quota_for_foreign_identity() {
        let config = AuthConfig::builder().requests_per_minute(1).build();
        let h = harness(&config);
        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let signed = h.auth.sign_outbound(&request).expect("sign");
        let foreign = exgate_auth::AuthHeaders::new(
            "intruder",
            signed.timestamp(),
            signed.signature(),
            signed.recv_window(),
        );

        for _ in 0..5 {
            assert_eq!(
                h.auth.validate_inbound(&foreign, &request, None).reason(),
                Some(RejectReason::InvalidApiKey)
            );
        }
        assert!(h.auth.validate_inbound(&signed, &request, None).is_valid());
    }
}

//! End-to-end signing and validation tests.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use exgate_auth::canonical::canonical_query;
    use exgate_auth::headers::{API_KEY_HEADER, RECV_WINDOW_HEADER, SIGN_HEADER, TIMESTAMP_HEADER};
    use exgate_auth::{
        AuthHeaders, InboundRequest, RejectReason, SecretKey, SignatureEngine, ValidationVerdict,
    };

    use crate::{API_KEY, SECRET, START_MS, default_harness};

    fn spot_request() -> InboundRequest {
        InboundRequest::get([("category", "spot"), ("symbol", "BTCUSDT")])
    }

    /// Replace the character at `index` with a different Base64 character.
    fn mutate_at(signature: &str, index: usize) -> String {
        signature
            .char_indices()
            .map(|(i, c)| {
                if i != index {
                    c
                } else if c == 'A' {
                    'B'
                } else {
                    'A'
                }
            })
            .collect()
    }

    #[test]
    fn test_should_validate_known_get_request_and_reject_every_mutation() {
        let h = default_harness();
        let params: HashMap<&str, &str> = [("category", "spot"), ("symbol", "BTCUSDT")]
            .into_iter()
            .collect();

        let signature = SignatureEngine
            .sign_get(SecretKey::from(SECRET), START_MS, &params)
            .expect("sign");
        let expected = SignatureEngine
            .sign(SecretKey::from(SECRET), "category=spot&symbol=BTCUSDT")
            .expect("sign");
        assert_eq!(signature, expected);

        let request = spot_request();
        let headers = AuthHeaders::new(API_KEY, START_MS, signature.clone(), 5000);
        assert_eq!(
            h.auth.validate_inbound(&headers, &request, None),
            ValidationVerdict::Valid
        );

        for index in 0..signature.len() {
            let mutated = mutate_at(&signature, index);
            assert_ne!(mutated, signature);
            let headers = AuthHeaders::new(API_KEY, START_MS, mutated, 5000);
            assert_eq!(
                h.auth.validate_inbound(&headers, &request, None).reason(),
                Some(RejectReason::InvalidSignature),
                "mutation at index {index} must fail"
            );
        }
    }

    #[test]
    fn test_should_sign_equal_for_reordered_params() {
        let h = default_harness();
        let a = h
            .auth
            .sign_for_get([("z", "1"), ("a", "2")])
            .expect("sign");
        let b = h
            .auth
            .sign_for_get([("a", "2"), ("z", "1")])
            .expect("sign");
        assert_eq!(a.signature(), b.signature());
        assert_eq!(canonical_query([("z", "1"), ("a", "2")]), "a=2&z=1");
    }

    #[test]
    fn test_should_round_trip_outbound_headers_through_http() {
        let h = default_harness();
        let request = spot_request();
        let headers = h.auth.sign_outbound(&request).expect("sign");

        let map = headers.to_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map[API_KEY_HEADER], API_KEY);
        assert_eq!(map[TIMESTAMP_HEADER], START_MS.to_string());
        assert_eq!(map[RECV_WINDOW_HEADER], "5000");
        assert!(map[SIGN_HEADER].ends_with('='));

        let http_headers = headers.to_header_map().expect("header map");
        assert!(h.auth.validate_http(&http_headers, &request, None).is_valid());
    }

    #[test]
    fn test_should_bind_post_signature_to_timestamp() {
        let h = default_harness();
        let body = r#"{"category":"spot","symbol":"BTCUSDT","side":"Buy","qty":"0.01"}"#;
        let request = InboundRequest::post(body);
        let signed = h.auth.sign_outbound(&request).expect("sign");
        assert!(h.auth.validate_inbound(&signed, &request, None).is_valid());

        let shifted = AuthHeaders::new(
            signed.api_key(),
            signed.timestamp() + 1,
            signed.signature(),
            signed.recv_window(),
        );
        assert_eq!(
            h.auth.validate_inbound(&shifted, &request, None).reason(),
            Some(RejectReason::InvalidSignature)
        );
    }

    #[test]
    fn test_should_sign_empty_post_body() {
        let h = default_harness();
        let request = InboundRequest::post("");
        let signed = h.auth.sign_outbound(&request).expect("sign");
        assert!(h.auth.validate_inbound(&signed, &request, None).is_valid());
    }

    #[test]
    fn test_should_serialize_verdicts_for_routing_layer() {
        let h = default_harness();
        let request = spot_request();
        let forged = AuthHeaders::new(API_KEY, START_MS, "Zm9yZ2Vk", 5000);
        let verdict = h.auth.validate_inbound(&forged, &request, None);

        let json = serde_json::to_value(verdict).expect("serialize");
        assert_eq!(json["valid"], false);
        assert_eq!(json["code"], "INVALID_SIGNATURE");
        let text = json.to_string();
        assert!(!text.contains(SECRET));
        assert!(!text.contains("Zm9yZ2Vk"));
    }
}

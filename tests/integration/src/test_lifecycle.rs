//! Context lifecycle, background eviction and key rotation tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use exgate_auth::{AuthContext, CredentialProvider, InboundRequest, StaticCredentialProvider};
    use exgate_core::{AuthConfig, Clock, ManualClock, SystemClock};

    use crate::{API_KEY, SECRET, START_MS, init_tracing};

    #[tokio::test]
    async fn test_should_evict_expired_nonces_in_background() {
        init_tracing();
        let clock = Arc::new(ManualClock::new(START_MS));
        let config = AuthConfig::builder()
            .nonce_expiration_secs(1)
            .nonce_cleanup_interval_secs(1)
            .build();
        let ctx = AuthContext::init(
            config,
            Arc::new(StaticCredentialProvider::new(API_KEY, SECRET)),
            clock.clone(),
        )
        .expect("init");

        let _ = ctx.issue_nonce();
        let _ = ctx.issue_nonce();
        clock.advance(Duration::from_secs(5));
        assert_eq!(ctx.nonce_stats().active, 0);
        assert_eq!(ctx.nonce_stats().total, 2);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while ctx.nonce_stats().total > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(ctx.nonce_stats().total, 0);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_release_credentials_and_nonces_on_shutdown() {
        init_tracing();
        let provider = Arc::new(StaticCredentialProvider::new(API_KEY, SECRET));
        let ctx = AuthContext::init(AuthConfig::default(), provider.clone(), Arc::new(SystemClock))
            .expect("init");

        let request = InboundRequest::post(r#"{"symbol":"BTCUSDT"}"#);
        let headers = ctx.authenticator().sign_outbound(&request).expect("sign");
        let nonce = ctx.issue_nonce();
        assert!(
            ctx.authenticator()
                .validate_inbound(&headers, &request, Some(&nonce))
                .is_valid()
        );
        let _ = ctx.issue_nonce();

        let started = tokio::time::Instant::now();
        ctx.shutdown().await;
        assert!(started.elapsed() < ctx.config().shutdown_timeout());

        assert!(ctx.is_shut_down());
        assert_eq!(ctx.nonce_stats().total, 0);
        assert!(provider.api_key().is_err());
        assert!(ctx.authenticator().sign_outbound(&request).is_err());

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_report_rate_table_stats() {
        init_tracing();
        let ctx = AuthContext::init(
            AuthConfig::default(),
            Arc::new(StaticCredentialProvider::new(API_KEY, SECRET)),
            Arc::new(ManualClock::new(START_MS)),
        )
        .expect("init");

        let request = InboundRequest::get([("symbol", "BTCUSDT")]);
        let headers = ctx.authenticator().sign_outbound(&request).expect("sign");
        assert!(
            ctx.authenticator()
                .validate_inbound(&headers, &request, None)
                .is_valid()
        );

        let stats = ctx.rate_limit_stats();
        assert_eq!(stats.total_identities, 1);
        assert_eq!(stats.active_identities, 1);
        let quota = ctx.authenticator().rate_limiter().remaining(API_KEY);
        assert_eq!(quota.minute, 59);
        assert_eq!(quota.hour, 999);

        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_should_report_key_rotation_status() {
        init_tracing();
        let clock = Arc::new(ManualClock::new(START_MS));
        let ctx = AuthContext::init(
            AuthConfig::default(),
            Arc::new(StaticCredentialProvider::new(API_KEY, SECRET)),
            clock.clone(),
        )
        .expect("init");

        let fresh = ctx.key_status(clock.now());
        assert!(!fresh.should_rotate);
        assert_eq!(fresh.days_until_expiration, 30);

        let stale = ctx.key_status(clock.now() - chrono::Duration::days(40));
        assert!(stale.is_expired);
        assert!(stale.should_rotate);
        assert_eq!(stale.days_until_expiration, -10);

        let json = serde_json::to_value(stale).expect("serialize");
        assert_eq!(json["isExpired"], true);

        ctx.shutdown().await;
    }
}

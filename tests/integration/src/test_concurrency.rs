//! Concurrent access to the shared nonce and rate tables.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use exgate_auth::nonce::NonceStore;
    use exgate_auth::rate_limit::RateLimiter;
    use exgate_auth::{InboundRequest, RejectReason};
    use exgate_core::{AuthConfig, Clock, ManualClock};

    use crate::{START_MS, harness, init_tracing};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_consume_nonce_exactly_once_under_contention() {
        init_tracing();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(START_MS));
        let store = Arc::new(NonceStore::new(std::time::Duration::from_secs(300), clock));

        for _ in 0..20 {
            let nonce = Arc::new(store.issue());
            let successes = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let store = store.clone();
                    let nonce = nonce.clone();
                    let successes = successes.clone();
                    tokio::spawn(async move {
                        if store.consume(&nonce) {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.await.expect("task");
            }

            assert_eq!(successes.load(Ordering::SeqCst), 1);
        }
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_never_overshoot_quota_for_one_identity() {
        init_tracing();
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(START_MS));
        let limiter = Arc::new(RateLimiter::new(25, 1000, clock));
        let allowed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let limiter = limiter.clone();
                let allowed = allowed.clone();
                tokio::spawn(async move {
                    if limiter.is_allowed("shared-key") {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task");
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 25);
        assert_eq!(limiter.remaining("shared-key").minute, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_validate_concurrent_requests_with_distinct_nonces() {
        let config = AuthConfig::builder().requests_per_minute(1000).build();
        let h = Arc::new(harness(&config));
        let request = Arc::new(InboundRequest::get([("category", "spot"), ("symbol", "ETHUSDT")]));
        let headers = Arc::new(h.auth.sign_outbound(&request).expect("sign"));

        let nonces: Vec<String> = (0..64).map(|_| h.auth.nonces().issue()).collect();
        let handles: Vec<_> = nonces
            .iter()
            .cloned()
            .chain(nonces.iter().cloned())
            .map(|nonce| {
                let h = h.clone();
                let request = request.clone();
                let headers = headers.clone();
                tokio::spawn(async move {
                    h.auth
                        .validate_inbound(&headers, &request, Some(&nonce))
                        .reason()
                })
            })
            .collect();

        let mut valid = 0;
        let mut replayed = 0;
        for handle in handles {
            match handle.await.expect("task") {
                None => valid += 1,
                Some(RejectReason::InvalidNonce) => replayed += 1,
                Some(other) => panic!("unexpected rejection: {other}"),
            }
        }
        assert_eq!(valid, 64);
        assert_eq!(replayed, 64);
        assert!(h.auth.nonces().is_empty());
    }
}

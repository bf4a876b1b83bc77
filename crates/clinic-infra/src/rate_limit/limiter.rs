//! Counter-backed rate limiter with fail-open error policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use clinic_core::ports::{CounterStore, RateLimitDecision, RateLimitError, RateLimiter, StoreError};
use clinic_core::{Action, Identifier, RateLimit, RateLimitPolicies};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// When false every request is allowed and the store is never touched.
    pub enabled: bool,
    /// Key prefix for counter keys.
    pub key_prefix: String,
    /// Upper bound on a single store round trip.
    pub op_timeout: Duration,
    /// Per-action limits.
    pub policies: RateLimitPolicies,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: "ratelimit".to_string(),
            op_timeout: Duration::from_millis(500),
            policies: RateLimitPolicies::default(),
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables.
    ///
    /// Per-action limits come from `RATE_LIMIT_<ACTION>=<count>/<seconds>`,
    /// e.g. `RATE_LIMIT_LOGIN=5/300`. Malformed values are logged and ignored.
    pub fn from_env() -> Self {
        let mut policies = RateLimitPolicies::default();

        for action in Action::ALL {
            let var = format!("RATE_LIMIT_{}", action.as_str().to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                match value.parse::<RateLimit>() {
                    Ok(limit) => policies.set(action, limit),
                    Err(e) => {
                        tracing::warn!(
                            var = %var,
                            value = %value,
                            error = %e,
                            "Ignoring invalid rate limit"
                        );
                    }
                }
            }
        }

        Self {
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "ratelimit".to_string()),
            op_timeout: Duration::from_millis(
                std::env::var("RATE_LIMIT_OP_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            policies,
        }
    }
}

/// Fixed window rate limiter over a shared [`CounterStore`].
pub struct CounterRateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl CounterRateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        tracing::info!(
            backend = store.backend(),
            enabled = config.enabled,
            "Rate limiter initialized"
        );
        Self { store, config }
    }

    fn make_key(&self, identifier: &Identifier, action: Action) -> String {
        format!("{}:{}:{}", self.config.key_prefix, action, identifier)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, RateLimitError> {
        tokio::time::timeout(self.config.op_timeout, op)
            .await
            .map_err(|_| RateLimitError::Timeout(self.config.op_timeout))?
            .map_err(RateLimitError::from)
    }
}

#[async_trait]
impl RateLimiter for CounterRateLimiter {
    async fn check_and_increment(
        &self,
        identifier: &Identifier,
        action: Action,
    ) -> RateLimitDecision {
        let limit = self.config.policies.get(action);
        if !self.config.enabled {
            return RateLimitDecision::fresh(*identifier, action, &limit);
        }

        let key = self.make_key(identifier, action);
        let hit = self
            .bounded(self.store.hit(&key, limit.max_requests, limit.window))
            .await;

        match hit {
            Ok(hit) => {
                let decision = RateLimitDecision::from_count(
                    *identifier,
                    action,
                    &limit,
                    hit.count,
                    hit.admitted,
                    hit.ttl,
                );
                if !decision.allowed {
                    tracing::warn!(
                        action = %action,
                        identifier = %identifier,
                        reset_in_secs = decision.reset_in_secs(),
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Err(e) => {
                tracing::error!(
                    action = %action,
                    identifier = %identifier,
                    backend = self.store.backend(),
                    error = %e,
                    "Rate limiter store unavailable, failing open"
                );
                RateLimitDecision::fail_open(*identifier, action, &limit)
            }
        }
    }

    async fn status(
        &self,
        identifier: &Identifier,
        action: Action,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let limit = self.config.policies.get(action);
        if !self.config.enabled {
            return Ok(RateLimitDecision::fresh(*identifier, action, &limit));
        }

        let key = self.make_key(identifier, action);
        let decision = match self.bounded(self.store.peek(&key)).await? {
            Some(hit) => RateLimitDecision::from_count(
                *identifier,
                action,
                &limit,
                hit.count,
                hit.count < limit.max_requests,
                hit.ttl,
            ),
            None => RateLimitDecision::fresh(*identifier, action, &limit),
        };

        Ok(decision)
    }

    async fn reset(&self, identifier: &Identifier, action: Action) -> Result<(), RateLimitError> {
        let key = self.make_key(identifier, action);
        self.bounded(self.store.remove(&key)).await?;

        tracing::info!(action = %action, identifier = %identifier, "Rate limit reset");
        Ok(())
    }

    fn policies(&self) -> &RateLimitPolicies {
        &self.config.policies
    }

    async fn health(&self) -> Result<(), RateLimitError> {
        self.bounded(self.store.ping()).await
    }

    fn backend(&self) -> &'static str {
        self.store.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCounterStore;
    use clinic_core::ports::CounterHit;
    use uuid::Uuid;

    struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn hit(&self, _: &str, _: u32, _: Duration) -> Result<CounterHit, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn peek(&self, _: &str) -> Result<Option<CounterHit>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn remove(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        fn backend(&self) -> &'static str {
            "unreachable"
        }
    }

    struct HangingStore;

    #[async_trait]
    impl CounterStore for HangingStore {
        async fn hit(&self, _: &str, _: u32, _: Duration) -> Result<CounterHit, StoreError> {
            std::future::pending().await
        }

        async fn peek(&self, _: &str) -> Result<Option<CounterHit>, StoreError> {
            std::future::pending().await
        }

        async fn remove(&self, _: &str) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }

        fn backend(&self) -> &'static str {
            "hanging"
        }
    }

    fn config(action: Action, limit: RateLimit) -> RateLimitConfig {
        RateLimitConfig {
            policies: RateLimitPolicies::default().with(action, limit),
            ..RateLimitConfig::default()
        }
    }

    fn memory_limiter(action: Action, limit: RateLimit) -> CounterRateLimiter {
        CounterRateLimiter::new(Arc::new(InMemoryCounterStore::new()), config(action, limit))
    }

    fn patient() -> Identifier {
        Identifier::User(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_remaining_decreases_until_blocked() {
        let limiter = memory_limiter(Action::Login, RateLimit::per_minute(3));
        let who = patient();

        let mut remaining = Vec::new();
        for _ in 0..3 {
            let d = limiter.check_and_increment(&who, Action::Login).await;
            assert!(d.allowed);
            assert!(!d.degraded);
            remaining.push(d.remaining);
        }
        assert_eq!(remaining, vec![2, 1, 0]);

        let blocked = limiter.check_and_increment(&who, Action::Login).await;
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert_eq!(blocked.limit, 3);
        assert!(blocked.reset_in <= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_restores_budget() {
        let limiter = memory_limiter(Action::Booking, RateLimit::per_minute(2));
        let who = patient();

        limiter.check_and_increment(&who, Action::Booking).await;
        limiter.check_and_increment(&who, Action::Booking).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        let blocked = limiter.check_and_increment(&who, Action::Booking).await;
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_in, Duration::from_secs(15));

        tokio::time::advance(Duration::from_secs(15)).await;
        for expected in [1, 0] {
            let d = limiter.check_and_increment(&who, Action::Booking).await;
            assert!(d.allowed);
            assert_eq!(d.remaining, expected);
        }
    }

    #[tokio::test]
    async fn test_actions_and_identifiers_are_isolated() {
        let limiter = memory_limiter(Action::Payment, RateLimit::per_minute(1));
        let alice = patient();
        let bob = patient();

        assert!(limiter.check_and_increment(&alice, Action::Payment).await.allowed);
        assert!(!limiter.check_and_increment(&alice, Action::Payment).await.allowed);

        assert!(limiter.check_and_increment(&bob, Action::Payment).await.allowed);
        assert!(limiter.check_and_increment(&alice, Action::Messaging).await.allowed);
    }

    #[tokio::test]
    async fn test_reset_unblocks_immediately() {
        let limiter = memory_limiter(Action::Registration, RateLimit::per_hour(1));
        let who: Identifier = "ip:198.51.100.7".parse().unwrap();

        limiter.check_and_increment(&who, Action::Registration).await;
        assert!(!limiter.check_and_increment(&who, Action::Registration).await.allowed);

        limiter.reset(&who, Action::Registration).await.unwrap();

        let d = limiter.check_and_increment(&who, Action::Registration).await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn test_status_does_not_consume_quota() {
        let limiter = memory_limiter(Action::Messaging, RateLimit::per_minute(5));
        let who = patient();

        let fresh = limiter.status(&who, Action::Messaging).await.unwrap();
        assert_eq!(fresh.remaining, 5);

        limiter.check_and_increment(&who, Action::Messaging).await;
        let after = limiter.status(&who, Action::Messaging).await.unwrap();
        let again = limiter.status(&who, Action::Messaging).await.unwrap();
        assert_eq!(after.remaining, 4);
        assert_eq!(again.remaining, 4);
        assert!(after.allowed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_never_overcount() {
        let limiter = Arc::new(memory_limiter(Action::Messaging, RateLimit::per_minute(10)));
        let who = patient();

        let tasks: Vec<_> = (0..25)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(
                    async move { limiter.check_and_increment(&who, Action::Messaging).await },
                )
            })
            .collect();

        let mut allowed_remaining = Vec::new();
        for task in tasks {
            let d = task.await.unwrap();
            if d.allowed {
                allowed_remaining.push(d.remaining);
            }
        }
        allowed_remaining.sort_unstable();

        assert_eq!(allowed_remaining, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open() {
        let limiter = CounterRateLimiter::new(
            Arc::new(UnreachableStore),
            config(Action::Login, RateLimit::per_minute(1)),
        );
        let who = patient();

        for _ in 0..3 {
            let d = limiter.check_and_increment(&who, Action::Login).await;
            assert!(d.allowed);
            assert!(d.degraded);
        }

        assert!(limiter.status(&who, Action::Login).await.is_err());
        assert!(limiter.reset(&who, Action::Login).await.is_err());
        assert!(limiter.health().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out_and_fails_open() {
        let limiter = CounterRateLimiter::new(
            Arc::new(HangingStore),
            config(Action::Payment, RateLimit::per_minute(1)),
        );

        let d = limiter.check_and_increment(&patient(), Action::Payment).await;
        assert!(d.allowed);
        assert!(d.degraded);

        let err = limiter.health().await.unwrap_err();
        assert!(matches!(err, RateLimitError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let limiter = CounterRateLimiter::new(
            Arc::new(UnreachableStore),
            RateLimitConfig {
                enabled: false,
                ..config(Action::Login, RateLimit::per_minute(1))
            },
        );

        for _ in 0..5 {
            let d = limiter.check_and_increment(&patient(), Action::Login).await;
            assert!(d.allowed);
            assert!(!d.degraded);
        }
    }

    #[test]
    fn test_key_layout() {
        let limiter = memory_limiter(Action::Login, RateLimit::per_minute(1));
        let who: Identifier = "ip:10.1.2.3".parse().unwrap();
        assert_eq!(limiter.make_key(&who, Action::Login), "ratelimit:login:ip:10.1.2.3");
    }
}

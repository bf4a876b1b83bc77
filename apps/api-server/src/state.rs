//! Application state - shared across all handlers.

use std::sync::Arc;

use clinic_core::ports::{CounterStore, RateLimiter, StoreError, TokenService};
use clinic_infra::{CounterRateLimiter, InMemoryCounterStore, JwtTokenService, RedisCounterStore};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<dyn RateLimiter>,
    pub tokens: Arc<dyn TokenService>,
    /// Set when counters live in process memory and need periodic purging.
    pub memory_store: Option<Arc<InMemoryCounterStore>>,
}

impl AppState {
    /// Build the application state, choosing the counter store.
    ///
    /// Redis is used when configured. If it cannot be reached at startup the
    /// server either falls back to in-memory counters or refuses to start,
    /// depending on `REDIS_FALLBACK_TO_MEMORY`.
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let (store, memory_store): (Arc<dyn CounterStore>, Option<Arc<InMemoryCounterStore>>) =
            match &config.redis {
                Some(redis) => match RedisCounterStore::new(redis).await {
                    Ok(store) => (Arc::new(store), None),
                    Err(e) if redis.fallback_to_memory => {
                        tracing::error!(
                            "Failed to connect to Redis: {}. Using in-memory counters.",
                            e
                        );
                        Self::memory_counters()
                    }
                    Err(e) => return Err(e),
                },
                None => {
                    tracing::warn!(
                        "REDIS_URL not set. Rate limit counters are per-process (in-memory mode)."
                    );
                    Self::memory_counters()
                }
            };

        let limiter: Arc<dyn RateLimiter> =
            Arc::new(CounterRateLimiter::new(store, config.rate_limit.clone()));
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(config.jwt.clone()));

        tracing::info!(backend = limiter.backend(), "Application state initialized");

        Ok(Self {
            limiter,
            tokens,
            memory_store,
        })
    }

    fn memory_counters() -> (Arc<dyn CounterStore>, Option<Arc<InMemoryCounterStore>>) {
        let memory = Arc::new(InMemoryCounterStore::new());
        let store: Arc<dyn CounterStore> = memory.clone();
        (store, Some(memory))
    }
}

//! In-memory counter store - used as fallback when Redis is unavailable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use clinic_core::ports::{CounterHit, CounterStore, StoreError};

struct Counter {
    count: u32,
    expires_at: Instant,
}

impl Counter {
    fn ttl(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// In-memory counter store using a HashMap behind an async RwLock.
///
/// Every mutation happens under the write lock, which makes `hit` atomic.
/// Note: Counters are per-process, not shared across instances, and are
/// lost on restart.
pub struct InMemoryCounterStore {
    counters: RwLock<HashMap<String, Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Drop expired counters. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut counters = self.counters.write().await;
        let before = counters.len();
        counters.retain(|_, counter| counter.expires_at > now);
        before - counters.len()
    }

    /// Number of counters currently held, expired or not.
    pub async fn tracked_keys(&self) -> usize {
        self.counters.read().await.len()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<CounterHit, StoreError> {
        let now = Instant::now();
        let mut counters = self.counters.write().await;

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now,
        });

        if counter.expires_at <= now {
            *counter = Counter {
                count: 0,
                expires_at: now + window,
            };
        }

        let admitted = counter.count < limit;
        if admitted {
            counter.count += 1;
        }

        Ok(CounterHit {
            count: counter.count,
            admitted,
            ttl: counter.ttl(now),
        })
    }

    async fn peek(&self, key: &str) -> Result<Option<CounterHit>, StoreError> {
        let now = Instant::now();
        let counters = self.counters.read().await;

        Ok(counters
            .get(key)
            .filter(|counter| counter.expires_at > now)
            .map(|counter| CounterHit {
                count: counter.count,
                admitted: true,
                ttl: counter.ttl(now),
            }))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut counters = self.counters.write().await;
        counters.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

//! Counter store port - the shared state behind rate limiting.

use async_trait::async_trait;
use std::time::Duration;

/// Snapshot of one window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterHit {
    /// Requests counted in the current window.
    pub count: u32,
    /// Whether this hit was counted (false once the limit is reached).
    pub admitted: bool,
    /// Time left until the window expires.
    pub ttl: Duration,
}

/// Counter store trait - abstraction over counter backends (Redis, in-memory).
///
/// `hit` must be atomic with respect to every other call on the same key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request against `key`.
    ///
    /// Creates the counter with `count = 1` and a TTL of `window` when it is
    /// missing or expired. Increments it, keeping the existing expiry, while
    /// `count < limit`. Leaves it untouched once `count >= limit`.
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<CounterHit, StoreError>;

    /// Read the counter without changing it.
    async fn peek(&self, key: &str) -> Result<Option<CounterHit>, StoreError>;

    /// Delete the counter.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Counter store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

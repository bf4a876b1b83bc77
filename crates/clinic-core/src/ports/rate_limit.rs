//! Rate limiting port.

use async_trait::async_trait;
use std::time::Duration;

use super::StoreError;
use crate::domain::{Action, Identifier, RateLimit, RateLimitPolicies};

/// Rate limiter trait - per-action, per-identifier request budgets.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request and decide whether it may proceed.
    ///
    /// Never fails: when the counter store is unavailable the request is
    /// allowed and the decision is marked `degraded`.
    async fn check_and_increment(&self, identifier: &Identifier, action: Action)
    -> RateLimitDecision;

    /// Current state of the budget without consuming any of it.
    async fn status(
        &self,
        identifier: &Identifier,
        action: Action,
    ) -> Result<RateLimitDecision, RateLimitError>;

    /// Forget the counter so the identifier starts a fresh window.
    async fn reset(&self, identifier: &Identifier, action: Action) -> Result<(), RateLimitError>;

    /// Configured limits.
    fn policies(&self) -> &RateLimitPolicies;

    /// Check that the counter store is reachable.
    async fn health(&self) -> Result<(), RateLimitError>;

    /// Counter store backend name.
    fn backend(&self) -> &'static str;
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub action: Action,
    pub identifier: Identifier,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: Duration,
    /// Set when the store could not be consulted and the request failed open.
    pub degraded: bool,
}

impl RateLimitDecision {
    /// Decision for a request counted as the `count`-th in its window.
    pub fn from_count(
        identifier: Identifier,
        action: Action,
        limit: &RateLimit,
        count: u32,
        allowed: bool,
        reset_in: Duration,
    ) -> Self {
        let remaining = if allowed {
            limit.max_requests.saturating_sub(count)
        } else {
            0
        };

        Self {
            action,
            identifier,
            allowed,
            limit: limit.max_requests,
            remaining,
            reset_in,
            degraded: false,
        }
    }

    /// Full budget, as seen when no counter exists yet.
    pub fn fresh(identifier: Identifier, action: Action, limit: &RateLimit) -> Self {
        Self {
            action,
            identifier,
            allowed: true,
            limit: limit.max_requests,
            remaining: limit.max_requests,
            reset_in: limit.window,
            degraded: false,
        }
    }

    /// Allow the request without having counted it.
    pub fn fail_open(identifier: Identifier, action: Action, limit: &RateLimit) -> Self {
        Self {
            degraded: true,
            ..Self::fresh(identifier, action, limit)
        }
    }

    /// `reset_in` rounded up to whole seconds, as exposed in headers.
    pub fn reset_in_secs(&self) -> u64 {
        let secs = self.reset_in.as_secs();
        if self.reset_in.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Rate limit errors.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),

    #[error("Counter store timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> Identifier {
        "ip:10.0.0.1".parse().unwrap()
    }

    #[test]
    fn test_from_count_remaining() {
        let limit = RateLimit::per_minute(3);
        let d = RateLimitDecision::from_count(ip(), Action::Login, &limit, 1, true, limit.window);
        assert_eq!(d.remaining, 2);

        let d = RateLimitDecision::from_count(ip(), Action::Login, &limit, 3, false, limit.window);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn test_fail_open_is_degraded_and_allowed() {
        let limit = RateLimit::per_hour(10);
        let d = RateLimitDecision::fail_open(ip(), Action::Payment, &limit);
        assert!(d.allowed);
        assert!(d.degraded);
        assert_eq!(d.remaining, 10);
    }

    #[test]
    fn test_reset_in_secs_rounds_up() {
        let limit = RateLimit::per_minute(1);
        let mut d = RateLimitDecision::fresh(ip(), Action::Booking, &limit);
        d.reset_in = Duration::from_millis(1_200);
        assert_eq!(d.reset_in_secs(), 2);
        d.reset_in = Duration::from_secs(4);
        assert_eq!(d.reset_in_secs(), 4);
    }
}

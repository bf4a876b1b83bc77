//! Rate limiter built on a shared counter store.

mod limiter;

pub use limiter::{CounterRateLimiter, RateLimitConfig};

//! # Clinic Infrastructure
//!
//! Concrete implementations of the ports defined in `clinic-core`:
//! counter stores and the rate limiter built on them, plus JWT identity.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory counters only
//! - `auth` - JWT bearer token validation
//! - `redis` - Redis-backed shared counters

pub mod rate_limit;
pub mod store;

#[cfg(feature = "auth")]
pub mod auth;

// Re-exports - In-Memory
pub use rate_limit::{CounterRateLimiter, RateLimitConfig};
pub use store::InMemoryCounterStore;

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisCounterStore};

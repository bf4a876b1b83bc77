//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod counter_store;
mod rate_limit;

pub use auth::{AuthError, TokenClaims, TokenService};
pub use counter_store::{CounterHit, CounterStore, StoreError};
pub use rate_limit::{RateLimitDecision, RateLimitError, RateLimiter};

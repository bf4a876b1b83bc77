//! Domain types - what is limited, for whom, and how much.

mod action;
mod identifier;
mod policy;

pub use action::Action;
pub use identifier::Identifier;
pub use policy::{RateLimit, RateLimitPolicies};

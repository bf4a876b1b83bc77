//! # Clinic Core
//!
//! The domain layer of the clinic rate limiter: actions, identifiers,
//! per-action policies, and the ports that infrastructure implements.
//! This crate has zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use domain::{Action, Identifier, RateLimit, RateLimitPolicies};
pub use error::DomainError;

//! Per-action rate limit policies.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use super::Action;
use crate::error::DomainError;

/// A bounded number of requests per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimit {
    pub max_requests: u32,
    #[serde(rename = "window_secs", serialize_with = "serialize_secs")]
    pub window: Duration,
}

fn serialize_secs<S: serde::Serializer>(window: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(window.as_secs())
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, DomainError> {
        if max_requests == 0 {
            return Err(DomainError::Validation(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(DomainError::Validation(
                "window must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window,
        })
    }

    /// Fixed-window constructors. Panics when `max_requests` is zero; use
    /// [`RateLimit::new`] for values that are not known at compile time.
    pub const fn per_minute(max_requests: u32) -> Self {
        assert!(max_requests > 0, "max_requests must be greater than zero");
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(max_requests: u32) -> Self {
        assert!(max_requests > 0, "max_requests must be greater than zero");
        Self {
            max_requests,
            window: Duration::from_secs(3600),
        }
    }

    pub const fn per_day(max_requests: u32) -> Self {
        assert!(max_requests > 0, "max_requests must be greater than zero");
        Self {
            max_requests,
            window: Duration::from_secs(86_400),
        }
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max_requests, self.window.as_secs())
    }
}

/// Parses the `<count>/<seconds>` form used in configuration, e.g. `5/300`.
impl FromStr for RateLimit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::Validation(format!("invalid rate limit '{}'", s));

        let (count, secs) = s.trim().split_once('/').ok_or_else(invalid)?;
        let count: u32 = count.trim().parse().map_err(|_| invalid())?;
        let secs: u64 = secs.trim().parse().map_err(|_| invalid())?;

        Self::new(count, Duration::from_secs(secs))
    }
}

/// The limit configured for each action.
#[derive(Debug, Clone)]
pub struct RateLimitPolicies {
    limits: HashMap<Action, RateLimit>,
}

impl RateLimitPolicies {
    /// Look up the limit for an action.
    pub fn get(&self, action: Action) -> RateLimit {
        self.limits
            .get(&action)
            .copied()
            .unwrap_or_else(|| Self::default_for(action))
    }

    /// Override the limit for one action.
    pub fn with(mut self, action: Action, limit: RateLimit) -> Self {
        self.limits.insert(action, limit);
        self
    }

    pub fn set(&mut self, action: Action, limit: RateLimit) {
        self.limits.insert(action, limit);
    }

    /// All policies in `Action::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Action, RateLimit)> + '_ {
        Action::ALL.into_iter().map(|action| (action, self.get(action)))
    }

    fn default_for(action: Action) -> RateLimit {
        match action {
            Action::Login => RateLimit {
                max_requests: 5,
                window: Duration::from_secs(300),
            },
            Action::Registration => RateLimit::per_hour(3),
            Action::Messaging => RateLimit::per_minute(30),
            Action::Booking => RateLimit::per_hour(10),
            Action::Payment => RateLimit {
                max_requests: 5,
                window: Duration::from_secs(600),
            },
        }
    }
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        let limits = Action::ALL
            .into_iter()
            .map(|action| (action, Self::default_for(action)))
            .collect();
        Self { limits }
    }
}

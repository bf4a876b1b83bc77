//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a rate limit check or status lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitDecisionResponse {
    pub action: String,
    pub identifier: String,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in_secs: u64,
    pub reset_at: DateTime<Utc>,
    /// True when the counter store was unavailable and the request failed open.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// A configured per-action limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicyResponse {
    pub action: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Response to an administrative reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResetResponse {
    pub action: String,
    pub identifier: String,
    pub reset: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_flag_omitted_when_false() {
        let response = RateLimitDecisionResponse {
            action: "login".to_string(),
            identifier: "ip:10.0.0.1".to_string(),
            allowed: true,
            limit: 5,
            remaining: 4,
            reset_in_secs: 300,
            reset_at: Utc::now(),
            degraded: false,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("degraded").is_none());

        let back: RateLimitDecisionResponse = serde_json::from_value(json).unwrap();
        assert!(!back.degraded);
    }
}

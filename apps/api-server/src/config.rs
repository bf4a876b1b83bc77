//! Application configuration loaded from environment variables.

use std::env;
use std::net::IpAddr;

use clinic_infra::{JwtConfig, RateLimitConfig, RedisConfig};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Shared counter store; `None` keeps counters in process memory.
    pub redis: Option<RedisConfig>,
    pub rate_limit: RateLimitConfig,
    /// Reverse proxies allowed to name the client in `X-Forwarded-For`.
    /// Empty means the socket peer is always the client.
    pub trusted_proxies: Vec<IpAddr>,
    pub jwt: JwtConfig,
    #[cfg(feature = "scheduler")]
    pub scheduler: crate::background::SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            redis: RedisConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .map(|v| parse_trusted_proxies(&v))
                .unwrap_or_default(),
            jwt: JwtConfig::from_env(),
            #[cfg(feature = "scheduler")]
            scheduler: crate::background::SchedulerConfig::from_env(),
        }
    }
}

/// Parse a comma-separated list of proxy addresses, skipping invalid entries.
fn parse_trusted_proxies(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<IpAddr>() {
            Ok(ip) => Some(ip.to_canonical()),
            Err(e) => {
                tracing::warn!(entry = %s, error = %e, "Ignoring invalid TRUSTED_PROXIES entry");
                None
            }
        })
        .collect()
}

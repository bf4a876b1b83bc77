//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub rate_limiter: RateLimiterHealth,
}

#[derive(Serialize)]
pub struct RateLimiterHealth {
    pub backend: &'static str,
    pub reachable: bool,
}

/// Health check endpoint - returns server status.
///
/// The service keeps answering while the counter store is down (requests
/// fail open), so an unreachable store reports `degraded` rather than an error.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let reachable = match state.limiter.health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Counter store health check failed");
            false
        }
    };

    let response = HealthResponse {
        status: if reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        rate_limiter: RateLimiterHealth {
            backend: state.limiter.backend(),
            reachable,
        },
    };

    HttpResponse::Ok().json(response)
}

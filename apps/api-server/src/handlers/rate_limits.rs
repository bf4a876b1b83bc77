//! Rate limit endpoints for the clinic's other services.

use actix_web::{HttpResponse, web};

use clinic_shared::ApiResponse;
use clinic_shared::dto::RateLimitPolicyResponse;

use super::decision_response;
use crate::middleware::error::AppResult;
use crate::middleware::rate_limit::RateLimited;
use crate::state::AppState;

/// GET /api/rate-limits/policies
pub async fn policies(state: web::Data<AppState>) -> HttpResponse {
    let policies: Vec<RateLimitPolicyResponse> = state
        .limiter
        .policies()
        .iter()
        .map(|(action, limit)| RateLimitPolicyResponse {
            action: action.to_string(),
            max_requests: limit.max_requests,
            window_secs: limit.window.as_secs(),
        })
        .collect();

    HttpResponse::Ok().json(ApiResponse::ok(policies))
}

/// POST /api/rate-limits/{action}
///
/// Consumes one unit of the caller's budget. Blocked calls never reach
/// this handler; the middleware answers them with 429.
pub async fn consume(RateLimited(decision): RateLimited) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(decision_response(&decision)))
}

//! Administrative rate limit endpoints.

use actix_web::{HttpResponse, web};

use clinic_core::{Action, Identifier};
use clinic_shared::ApiResponse;
use clinic_shared::dto::RateLimitResetResponse;

use super::decision_response;
use crate::middleware::auth::AdminIdentity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

fn parse_target(path: (String, String)) -> AppResult<(Action, Identifier)> {
    let (action, identifier) = path;
    Ok((action.parse::<Action>()?, identifier.parse::<Identifier>()?))
}

/// GET /api/admin/rate-limits/{action}/{identifier}
pub async fn status(
    _admin: AdminIdentity,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (action, identifier) = parse_target(path.into_inner())?;

    let decision = state.limiter.status(&identifier, action).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(decision_response(&decision))))
}

/// DELETE /api/admin/rate-limits/{action}/{identifier}
pub async fn reset(
    AdminIdentity(admin): AdminIdentity,
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AppResult<HttpResponse> {
    let (action, identifier) = parse_target(path.into_inner())?;

    state.limiter.reset(&identifier, action).await?;

    tracing::info!(
        admin = %admin.email,
        admin_id = %admin.user_id,
        action = %action,
        identifier = %identifier,
        "Rate limit reset by administrator"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        RateLimitResetResponse {
            action: action.to_string(),
            identifier: identifier.to_string(),
            reset: true,
        },
        "Rate limit cleared",
    )))
}

//! HTTP handlers and route configuration.

mod admin;
mod health;
mod rate_limits;

use actix_web::web;
use chrono::{TimeDelta, Utc};
use std::net::IpAddr;
use std::sync::Arc;

use clinic_core::Action;
use clinic_core::ports::{RateLimitDecision, RateLimiter};
use clinic_shared::dto::RateLimitDecisionResponse;

use crate::middleware::rate_limit::RateLimitMiddleware;

/// Configure all application routes.
///
/// Every action gets its own `POST /api/rate-limits/{action}` resource
/// wrapped by the rate limit middleware for that action.
pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    limiter: &Arc<dyn RateLimiter>,
    trusted_proxies: &Arc<[IpAddr]>,
) {
    let mut rate_limits =
        web::scope("/rate-limits").route("/policies", web::get().to(rate_limits::policies));

    for action in Action::ALL {
        rate_limits = rate_limits.service(
            web::resource(format!("/{}", action))
                .wrap(
                    RateLimitMiddleware::new(limiter.clone(), action)
                        .trusted_proxies(trusted_proxies.clone()),
                )
                .route(web::post().to(rate_limits::consume)),
        );
    }

    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            .service(rate_limits)
            // Admin routes
            .service(
                web::scope("/admin/rate-limits")
                    .route("/{action}/{identifier}", web::get().to(admin::status))
                    .route("/{action}/{identifier}", web::delete().to(admin::reset)),
            ),
    );
}

fn decision_response(decision: &RateLimitDecision) -> RateLimitDecisionResponse {
    let reset_in = TimeDelta::from_std(decision.reset_in).unwrap_or(TimeDelta::zero());

    RateLimitDecisionResponse {
        action: decision.action.to_string(),
        identifier: decision.identifier.to_string(),
        allowed: decision.allowed,
        limit: decision.limit,
        remaining: decision.remaining,
        reset_in_secs: decision.reset_in_secs(),
        reset_at: Utc::now() + reset_in,
        degraded: decision.degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use clinic_core::RateLimit;
    use clinic_infra::{
        CounterRateLimiter, InMemoryCounterStore, JwtConfig, JwtTokenService, RateLimitConfig,
    };
    use serde_json::Value;

    use crate::state::AppState;

    fn test_state() -> AppState {
        let config = RateLimitConfig {
            policies: RateLimitConfig::default()
                .policies
                .with(Action::Booking, RateLimit::per_hour(2)),
            ..RateLimitConfig::default()
        };
        let store = Arc::new(InMemoryCounterStore::new());

        AppState {
            limiter: Arc::new(CounterRateLimiter::new(store.clone(), config)),
            tokens: Arc::new(JwtTokenService::new(JwtConfig {
                secret: "handler-test-secret".to_string(),
                ..JwtConfig::default()
            })),
            memory_store: Some(store),
        }
    }

    fn bearer(state: &AppState, roles: &[&str]) -> String {
        let token = state
            .tokens
            .generate_token(
                uuid::Uuid::new_v4(),
                "staff@clinic.test",
                roles.iter().map(|r| r.to_string()).collect(),
            )
            .unwrap();
        format!("Bearer {}", token)
    }

    fn book(ip: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/rate-limits/booking")
            .peer_addr(format!("{}:5000", ip).parse().unwrap())
    }

    macro_rules! app {
        ($state:expr) => {{
            let state = $state.clone();
            let limiter = state.limiter.clone();
            test::init_service(
                App::new()
                    .app_data(web::Data::new(state.clone()))
                    .app_data(web::Data::new(state.tokens.clone()))
                    .configure(|cfg| configure_routes(cfg, &limiter, &Arc::from(Vec::new()))),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn test_health_reports_memory_backend() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["rate_limiter"]["backend"], "memory");
        assert_eq!(body["rate_limiter"]["reachable"], true);
    }

    #[actix_web::test]
    async fn test_policies_list_every_action() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/rate-limits/policies").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let policies = body["data"].as_array().unwrap();
        assert_eq!(policies.len(), Action::ALL.len());
        let booking = policies.iter().find(|p| p["action"] == "booking").unwrap();
        assert_eq!(booking["max_requests"], 2);
        assert_eq!(booking["window_secs"], 3600);
    }

    #[actix_web::test]
    async fn test_consume_until_blocked() {
        let state = test_state();
        let app = app!(state);

        for expected in [1, 0] {
            let req = book("10.0.0.9").to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["allowed"], true);
            assert_eq!(body["remaining"], expected);
            assert_eq!(body["identifier"], "ip:10.0.0.9");
        }

        let res = test::call_service(&app, book("10.0.0.9").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn test_admin_routes_require_admin_role() {
        let state = test_state();
        let app = app!(state);
        let uri = "/api/admin/rate-limits/booking/ip:10.0.0.9";

        let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::delete()
            .uri(uri)
            .insert_header(("authorization", bearer(&state, &["psychologist"])))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_admin_status_and_reset() {
        let state = test_state();
        let app = app!(state);
        let admin = bearer(&state, &["admin"]);
        let uri = "/api/admin/rate-limits/booking/ip:10.0.0.9";

        test::call_service(&app, book("10.0.0.9").to_request()).await;
        test::call_service(&app, book("10.0.0.9").to_request()).await;

        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(("authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["allowed"], false);
        assert_eq!(body["data"]["remaining"], 0);

        let req = test::TestRequest::delete()
            .uri(uri)
            .insert_header(("authorization", admin.clone()))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["reset"], true);

        let res = test::call_service(&app, book("10.0.0.9").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_admin_rejects_bad_targets() {
        let state = test_state();
        let app = app!(state);
        let admin = bearer(&state, &["admin"]);

        let req = test::TestRequest::get()
            .uri("/api/admin/rate-limits/invoices/ip:10.0.0.9")
            .insert_header(("authorization", admin.clone()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/admin/rate-limits/booking/session:abc")
            .insert_header(("authorization", admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}

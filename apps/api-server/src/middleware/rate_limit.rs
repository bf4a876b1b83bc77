//! Rate limiting middleware.

use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
    body::EitherBody,
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use clinic_core::ports::{RateLimitDecision, RateLimiter};
use clinic_core::{Action, Identifier};
use clinic_shared::ErrorResponse;

use super::auth::authenticate;
use super::error::AppError;

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Rate limiting middleware factory.
///
/// Wraps a resource and counts every request against `action` for the
/// caller: the authenticated user when a valid bearer token is present,
/// otherwise the client IP.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    action: Action,
    trusted_proxies: Arc<[IpAddr]>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>, action: Action) -> Self {
        Self {
            limiter,
            action,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    /// Reverse proxies whose `X-Forwarded-For` entries are believed.
    ///
    /// Requests from any other peer are identified by the socket address.
    pub fn trusted_proxies(mut self, proxies: impl Into<Arc<[IpAddr]>>) -> Self {
        self.trusted_proxies = proxies.into();
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            action: self.action,
            trusted_proxies: self.trusted_proxies.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    action: Action,
    trusted_proxies: Arc<[IpAddr]>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();
        let action = self.action;
        let identifier = resolve_identifier(&req, &self.trusted_proxies);

        Box::pin(async move {
            let decision = limiter.check_and_increment(&identifier, action).await;

            if !decision.allowed {
                let retry_after = decision.reset_in_secs();
                let error = ErrorResponse::too_many_requests(action.as_str(), retry_after)
                    .with_instance(req.path());

                let mut response = HttpResponse::TooManyRequests()
                    .insert_header((header::RETRY_AFTER, retry_after))
                    .json(error);
                insert_rate_limit_headers(response.headers_mut(), &decision);

                return Ok(req.into_response(response).map_into_right_body());
            }

            tracing::debug!(
                action = %action,
                identifier = %identifier,
                remaining = decision.remaining,
                "Rate limit check passed"
            );

            req.extensions_mut().insert(RateLimited(decision.clone()));

            let mut res = service.call(req).await?;
            insert_rate_limit_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

/// Pick the subject to count the request against.
///
/// Requests with no resolvable address share one bucket.
fn resolve_identifier(req: &ServiceRequest, trusted_proxies: &[IpAddr]) -> Identifier {
    if let Ok(identity) = authenticate(req.request()) {
        return Identifier::User(identity.user_id);
    }

    let ip = client_ip(req, trusted_proxies).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    Identifier::Ip(ip)
}

fn client_ip(req: &ServiceRequest, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let peer = req.peer_addr()?.ip().to_canonical();

    if trusted_proxies.contains(&peer) {
        return forwarded_client(req.headers(), trusted_proxies).or(Some(peer));
    }

    Some(peer)
}

/// Walk `X-Forwarded-For` from the nearest hop outward and return the first
/// address that is not one of our proxies.
///
/// Entries left of that point were supplied by the client and are ignored.
fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    for hop in hops.into_iter().rev() {
        let ip = parse_ip(hop)?.to_canonical();
        if !trusted_proxies.contains(&ip) {
            return Some(ip);
        }
    }

    None
}

fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .ok()
        .or_else(|| raw.trim_matches(['[', ']']).parse().ok())
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_LIMIT),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_RESET),
        HeaderValue::from(decision.reset_in_secs()),
    );
}

/// The decision made for the current request, for handlers behind the middleware.
#[derive(Debug, Clone)]
pub struct RateLimited(pub RateLimitDecision);

impl FromRequest for RateLimited {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let decision = req.extensions().get::<RateLimited>().cloned().ok_or_else(|| {
            AppError::Internal("handler is not wrapped by RateLimitMiddleware".to_string())
        });

        ready(decision)
    }
}

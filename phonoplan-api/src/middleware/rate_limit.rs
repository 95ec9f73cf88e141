/// Rate limiting middleware for public and expensive endpoints
///
/// Wraps a route with a [`RateLimitPolicy`] and counts requests per client
/// with the shared [`RateLimiter`] (Redis when configured, process memory
/// otherwise). Limited routes: login, registration and plan generation.
///
/// # Client Identity
///
/// First entry of `X-Forwarded-For`, else the TCP peer address, else
/// `"unknown"`.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per window
/// - `X-RateLimit-Remaining`: requests left in the window
/// - `X-RateLimit-Reset`: unix seconds when the window ends (429 only)
/// - `Retry-After`: seconds to wait (429 only)
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::post, Router};
/// use phonoplan_api::middleware::rate_limit::{rate_limit_layer, RateLimitState};
/// use phonoplan_shared::rate_limit::{RateLimitPolicy, RateLimiter};
///
/// # async fn handler() {}
/// let limiter = Arc::new(RateLimiter::memory_only());
/// let app: Router = Router::new().route(
///     "/api/auth/login",
///     post(handler).layer(middleware::from_fn_with_state(
///         RateLimitState::new(limiter, RateLimitPolicy::LOGIN),
///         rate_limit_layer,
///     )),
/// );
/// ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use phonoplan_shared::rate_limit::{RateLimitOutcome, RateLimitPolicy, RateLimiter};

use crate::error::ApiError;

/// Client id used when neither a forwarded address nor a peer is known
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Limiter plus the policy of one route
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<RateLimiter>,
    policy: RateLimitPolicy,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }
}

/// Identifies the caller for rate limiting
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: the client's window is full
pub async fn rate_limit_layer(
    State(limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), peer);

    match limit.limiter.check(&client, &limit.policy).await {
        RateLimitOutcome::Rejected {
            retry_after_secs,
            limit: max_requests,
            reset_at,
        } => {
            tracing::warn!(
                policy = limit.policy.identifier,
                client = %client,
                retry_after = retry_after_secs,
                "Rate limit exceeded"
            );
            Err(ApiError::RateLimitExceeded {
                retry_after: retry_after_secs,
                limit: max_requests,
                reset_at,
            })
        }
        RateLimitOutcome::Allowed {
            limit: max_requests,
            remaining,
            ..
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(max_requests));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
            Ok(response)
        }
    }
}

//! HTTP middleware: CORS, request ids, rate limiting.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::ApiError;

/// Global rate limiter shared by the API routes.
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build the global rate limiter from config.
pub fn build_rate_limiter(config: &ApiConfig) -> Arc<GlobalRateLimiter> {
    let quota = Quota::per_second(
        std::num::NonZeroU32::new(config.rate_limit_rps.max(1)).expect("nonzero rps"),
    );
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limit middleware.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<GlobalRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if limiter.check().is_err() {
        metrics::counter!("adreel_rate_limit_hits_total").increment(1);
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(request).await)
}

/// Attach a request id to every request and response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

/// Build the CORS layer from config.
pub fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

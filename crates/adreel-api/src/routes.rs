//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{create_ad, create_ad_stream, get_ad, health, list_ads, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{build_rate_limiter, cors_layer, rate_limit_middleware, request_id};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = build_rate_limiter(&state.config);

    let ad_routes = Router::new()
        .route("/ads", post(create_ad))
        .route("/ads/stream", post(create_ad_stream))
        .route("/ads/:job_id", get(get_ad))
        .route("/user/ads", get(list_ads))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", ad_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .with_state(state)
}

//! HTTP route handlers.
//!
//! All endpoints return JSON and are marked `no-store`: health responses must
//! always be fresh, and the rest describe live state. The webhook route is
//! mounted on the token-derived path from configuration.
//!
//! Only the webhook routes share the `max_connections` permit pool. Health and
//! info routes stay outside it so probes are answered while deliveries queue.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod home;
pub mod webhook;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use http::StatusCode;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::{CACHE_CONTROL_NO_STORE, HEALTH_PATH};
use crate::middleware::{concurrency_limit_layer, request_id_layer, ConcurrencyLimit};
use crate::state::AppState;

/// Creates the Axum router with all routes and layers.
pub fn create_router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path();
    let max_connections = state.config.http.max_connections;
    let request_timeout = state.request_timeout;

    let info_routes = Router::new()
        .route("/", get(home::index))
        .route("/info", get(home::info))
        .route(HEALTH_PATH, get(health::health));

    let webhook_routes = Router::new()
        .route("/webhook/set", post(webhook::set))
        .route("/webhook/delete", post(webhook::delete))
        .route(&webhook_path, post(webhook::receive))
        .route_layer(middleware::from_fn_with_state(
            ConcurrencyLimit::new(max_connections),
            concurrency_limit_layer,
        ));

    Router::new()
        .merge(info_routes)
        .merge(webhook_routes)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

//! HTTP route handlers.
//!
//! Lookups (`/safe`, `/vuln`) are served with `Cache-Control: no-store`
//! since they reflect live table contents. `/health` carries no cache header.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod lookup;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_LOOKUP;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let lookup_routes = Router::new()
        .route("/safe", get(lookup::safe))
        .route("/vuln", get(lookup::vuln))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_LOOKUP),
        ));

    let health_routes = Router::new().route("/health", get(health::health));

    Router::new()
        .merge(lookup_routes)
        .merge(health_routes)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}

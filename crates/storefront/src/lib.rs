//! Tienda storefront library.
//!
//! JSON API for the shop (`/api`) and its back-office (`/admin/api`),
//! exposed as a library so the router can be tested in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

use axum::{
    Router,
    http::{HeaderValue, Method, Request, header},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// CORS for the shop's own front-end origin.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = state.config().base_url.origin().ascii_serialization();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match HeaderValue::from_str(&origin) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(%origin, "Base URL origin is not a valid header; CORS disabled");
            cors
        }
    }
}

/// The full application router with its middleware, minus the Sentry
/// layers the binary adds on top.
pub fn app(state: AppState) -> Router {
    routes::routes(state.clone())
        .layer(cors_layer(&state))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

//! HTTP routes.
//!
//! - `/api` - public storefront API
//! - `/admin/api` - back-office API (bearer token)
//! - `/health`, `/health/ready` - health checks

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod coupons;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, checkout_rate_limiter, shipping_rate_limiter};
use crate::state::AppState;

pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::create))
        .layer(checkout_rate_limiter())
}

pub fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/rates", post(shipping::rates))
        .route("/agencies", get(shipping::agencies))
        .layer(shipping_rate_limiter())
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/cart/validate", post(cart::validate))
        .route("/coupons/validate", post(coupons::validate))
        .route("/orders/{public_id}", get(orders::show))
        .layer(api_rate_limiter())
}

/// Public API. The payment webhook is not rate limited: notifications
/// come from the provider's servers.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(checkout_routes())
        .merge(catalog_routes())
        .nest("/shipping", shipping_routes())
        .route("/payments/webhook", post(payments::webhook))
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .nest("/api", api_routes())
        .nest("/admin/api", admin::routes(state))
}

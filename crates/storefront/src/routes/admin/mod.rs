//! Back-office JSON API, mounted at `/admin/api`.
//!
//! Every route requires `Authorization: Bearer <ADMIN_API_TOKEN>`.

pub mod analytics;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod shipping;

use axum::{
    Router,
    middleware::from_extractor_with_state,
    routing::{get, post, put},
};

use crate::middleware::RequireAdmin;
use crate::state::AppState;

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::delete),
        )
        .route(
            "/{id}/variants/{variant_id}/stock",
            put(products::set_stock),
        )
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/advance", post(orders::advance))
        .route("/{id}/shipment", post(orders::create_shipment))
}

pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route("/{id}/activate", post(coupons::activate))
        .route("/{id}/deactivate", post(coupons::deactivate))
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/coupons", coupon_routes())
        .route("/shipping/import", post(shipping::import))
        .route("/analytics/summary", get(analytics::summary))
        .route_layer(from_extractor_with_state::<RequireAdmin, AppState>(state))
}

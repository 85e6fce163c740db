//! Checkout route.

use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use tracing::instrument;

use crate::error::{ApiResponse, Result, add_breadcrumb};
use crate::extract::Json;
use crate::services::checkout::{CheckoutOutcome, CheckoutRequest};
use crate::state::AppState;

/// Place an order.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, ApiResponse<CheckoutOutcome>)> {
    let outcome = state.checkout().place_order(&request, Utc::now()).await?;

    let order_id = outcome.order.id.to_string();
    let total = outcome.order.total.to_string();
    add_breadcrumb(
        "checkout",
        "Order placed",
        &[("order_id", order_id.as_str()), ("total", total.as_str())],
    );

    Ok((StatusCode::CREATED, ApiResponse::ok(outcome)))
}

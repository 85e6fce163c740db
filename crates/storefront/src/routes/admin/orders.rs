//! Admin order management.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use tienda_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::models::{Order, OrderDetail, OrderFilter, OrderPage, Shipment};
use crate::services::orders::advance as advance_order;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<ApiResponse<OrderPage>> {
    let page = OrderRepository::new(state.pool())
        .list(filter.normalized())
        .await?;
    Ok(ApiResponse::ok(page))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<ApiResponse<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    Ok(ApiResponse::ok(repo.detail(order).await?))
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub status: OrderStatus,
}

/// Move an order to its next status.
#[instrument(skip(state))]
pub async fn advance(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<AdvanceRequest>,
) -> Result<ApiResponse<Order>> {
    let order = advance_order(state.pool(), id, body.status).await?;
    Ok(ApiResponse::ok(order))
}

/// Register the order's parcel with the carrier.
#[instrument(skip(state))]
pub async fn create_shipment(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<(StatusCode, ApiResponse<Shipment>)> {
    let shipment = state.shipping().import_order(state.pool(), id).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(shipment)))
}

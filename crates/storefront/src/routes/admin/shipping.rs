//! Raw shipment import, for parcels that did not come from an order.

use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use tracing::instrument;

use tienda_correo::ShipmentImportRequest;

use crate::error::{ApiResponse, Result};
use crate::extract::Json;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub ext_order_id: String,
    pub delivery_type: &'static str,
    pub created_at: Option<String>,
}

#[instrument(skip(state, request), fields(ext_order_id = %request.ext_order_id))]
pub async fn import(
    State(state): State<AppState>,
    Json(request): Json<ShipmentImportRequest>,
) -> Result<(StatusCode, ApiResponse<ImportResult>)> {
    let (import, receipt) = state.shipping().import(&request).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(ImportResult {
            ext_order_id: import.ext_order_id,
            delivery_type: import.delivery.delivery_type().code(),
            created_at: receipt.created_at,
        }),
    ))
}

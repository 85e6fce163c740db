//! Cart preview.
//!
//! The cart lives on the client; this checks it against the catalog
//! without reserving anything.

use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use tienda_core::CartLine;

use crate::error::{ApiResponse, Result};
use crate::extract::Json;
use crate::services::checkout::CartPreview;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub items: Vec<CartLine>,
}

/// Price the cart from the catalog and report stock shortages.
#[instrument(skip(state, request), fields(lines = request.items.len()))]
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<CartRequest>,
) -> Result<ApiResponse<CartPreview>> {
    let preview = state.checkout().preview(&request.items).await?;
    Ok(ApiResponse::ok(preview))
}

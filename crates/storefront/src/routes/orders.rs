//! Public order lookup by the id given to the customer.

use axum::extract::State;
use tracing::instrument;
use uuid::Uuid;

use crate::db::OrderRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::extract::Path;
use crate::models::OrderDetail;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(public_id): Path<Uuid>,
) -> Result<ApiResponse<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_by_public_id(public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    Ok(ApiResponse::ok(repo.detail(order).await?))
}

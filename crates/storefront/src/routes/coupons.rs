//! Public coupon check.

use axum::extract::State;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tienda_core::{CartLine, CouponError, Money};

use crate::db::CouponRepository;
use crate::error::{ApiResponse, Result};
use crate::extract::Json;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CouponCheckRequest {
    pub code: String,
    pub items: Vec<CartLine>,
}

/// What the coupon would do to the cart.
#[derive(Debug, Serialize)]
pub struct CouponQuote {
    pub code: String,
    pub discount_percent: Decimal,
    pub subtotal: Money,
    pub discount: Money,
    pub discounted_subtotal: Money,
}

/// Check a coupon against a cart priced from the catalog.
#[instrument(skip(state, request), fields(code = %request.code))]
pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<CouponCheckRequest>,
) -> Result<ApiResponse<CouponQuote>> {
    let preview = state.checkout().preview(&request.items).await?;

    let coupon = CouponRepository::new(state.pool())
        .find_by_code(&request.code)
        .await?
        .ok_or(CouponError::NotFound)?;
    coupon.validate(preview.subtotal, Utc::now())?;

    let discount = coupon.discount_for(preview.subtotal);
    Ok(ApiResponse::ok(CouponQuote {
        code: coupon.code,
        discount_percent: coupon.discount_percent,
        subtotal: preview.subtotal,
        discount,
        discounted_subtotal: preview.subtotal.saturating_sub(discount),
    }))
}

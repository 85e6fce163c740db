//! Admin coupon management.

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};

use tienda_core::coupon::{normalize_code, validate_definition};
use tienda_core::{Coupon, CouponId, Money};

use crate::db::{CouponRepository, NewCoupon};
use crate::error::{ApiResponse, Result};
use crate::extract::{Json, Path};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub discount_percent: Decimal,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub min_purchase: Option<Money>,
}

#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<ApiResponse<Vec<Coupon>>> {
    Ok(ApiResponse::ok(
        CouponRepository::new(state.pool()).list().await?,
    ))
}

#[instrument(skip(state, input), fields(code = %input.code))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CouponInput>,
) -> Result<(StatusCode, ApiResponse<Coupon>)> {
    validate_definition(
        &input.code,
        input.discount_percent,
        input.max_uses,
        input.min_purchase,
    )?;

    let coupon = CouponRepository::new(state.pool())
        .create(&NewCoupon {
            code: normalize_code(&input.code),
            discount_percent: input.discount_percent,
            expires_at: input.expires_at,
            max_uses: input.max_uses,
            min_purchase: input.min_purchase,
        })
        .await?;
    info!(coupon_id = %coupon.id, "Coupon created");
    Ok((StatusCode::CREATED, ApiResponse::ok(coupon)))
}

#[instrument(skip(state))]
pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<ApiResponse<Coupon>> {
    set_active(&state, id, true).await
}

#[instrument(skip(state))]
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<ApiResponse<Coupon>> {
    set_active(&state, id, false).await
}

async fn set_active(state: &AppState, id: CouponId, active: bool) -> Result<ApiResponse<Coupon>> {
    let coupon = CouponRepository::new(state.pool())
        .set_active(id, active)
        .await?;
    info!(coupon_id = %coupon.id, active, "Coupon updated");
    Ok(ApiResponse::ok(coupon))
}

//! Public shipping routes: rate quotes and agency lookup.

use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use tienda_correo::{Agency, AgencyService, ProvinceCode, RateQuote};

use crate::error::{ApiResponse, AppError, Result};
use crate::extract::{Json, Query};
use crate::services::shipping::RateQuoteInput;
use crate::state::AppState;

/// Quote a parcel. The origin defaults to the store's postal code.
#[instrument(skip(state, input), fields(destination = %input.postal_code_destination))]
pub async fn rates(
    State(state): State<AppState>,
    Json(input): Json<RateQuoteInput>,
) -> Result<ApiResponse<RateQuote>> {
    let quote = state.shipping().quote(&input).await?;
    Ok(ApiResponse::ok(quote))
}

#[derive(Debug, Deserialize)]
pub struct AgencyParams {
    pub province: String,
    #[serde(default)]
    pub services: Option<AgencyService>,
}

/// Active agencies in a province; pickup agencies unless `services` says
/// otherwise.
#[instrument(skip(state))]
pub async fn agencies(
    State(state): State<AppState>,
    Query(params): Query<AgencyParams>,
) -> Result<ApiResponse<Vec<Agency>>> {
    let province: ProvinceCode = params.province.parse().map_err(AppError::BadRequest)?;
    let services = params.services.or(Some(AgencyService::PickupAvailability));

    let agencies = state.shipping().agencies(province, services).await?;
    Ok(ApiResponse::ok(agencies))
}

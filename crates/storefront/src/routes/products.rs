//! Public catalog routes.

use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use tienda_core::ProductId;

use crate::db::ProductRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::extract::{Path, Query};
use crate::models::{ProductFilter, ProductWithVariants};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub category: Option<String>,
}

/// Active products, optionally in one category.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<ApiResponse<Vec<ProductWithVariants>>> {
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        include_inactive: false,
    };
    let products = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(ApiResponse::ok(products))
}

/// One active product with its variants.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<ProductWithVariants>> {
    let product = ProductRepository::new(state.pool())
        .get(id, false)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(ApiResponse::ok(product))
}

//! Admin catalog management.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::{info, instrument};

use tienda_core::{ProductId, VariantId};

use crate::db::ProductRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::models::{NewProduct, ProductFilter, ProductUpdate, ProductWithVariants, Variant};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AdminCatalogQuery {
    #[serde(default)]
    pub category: Option<String>,
}

/// Every product, inactive ones included.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<AdminCatalogQuery>,
) -> Result<ApiResponse<Vec<ProductWithVariants>>> {
    let filter = ProductFilter {
        category: query.category,
        include_inactive: true,
    };
    Ok(ApiResponse::ok(
        ProductRepository::new(state.pool()).list(&filter).await?,
    ))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<ProductWithVariants>> {
    let product = ProductRepository::new(state.pool())
        .get(id, true)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(ApiResponse::ok(product))
}

#[instrument(skip(state, product), fields(slug = %product.slug))]
pub async fn create(
    State(state): State<AppState>,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, ApiResponse<ProductWithVariants>)> {
    let errors = product.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let created = ProductRepository::new(state.pool()).create(&product).await?;
    info!(product_id = %created.product.id, "Product created");
    Ok((StatusCode::CREATED, ApiResponse::ok(created)))
}

#[instrument(skip(state, update))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<ApiResponse<ProductWithVariants>> {
    let errors = update.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let updated = ProductRepository::new(state.pool())
        .update(id, &update)
        .await?;
    Ok(ApiResponse::ok(updated))
}

/// Soft delete: the product disappears from the shop, orders keep it.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).deactivate(id).await?;
    info!(product_id = %id, "Product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock: i32,
}

#[instrument(skip(state))]
pub async fn set_stock(
    State(state): State<AppState>,
    Path((product_id, variant_id)): Path<(ProductId, VariantId)>,
    Json(body): Json<StockUpdate>,
) -> Result<ApiResponse<Variant>> {
    if body.stock < 0 {
        return Err(AppError::Validation(vec![
            "stock cannot be negative".to_string(),
        ]));
    }

    let variant = ProductRepository::new(state.pool())
        .set_variant_stock(product_id, variant_id, body.stock)
        .await?;
    info!(variant_id = %variant.id, stock = variant.stock, "Stock updated");
    Ok(ApiResponse::ok(variant))
}

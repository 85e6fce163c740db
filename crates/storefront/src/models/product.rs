//! Catalog models.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use tienda_core::{Money, ProductId, StockKey, VariantId};
use tienda_correo::units::{MAX_DIMENSION_CM, MAX_WEIGHT_GRAMS};

/// A catalog product.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub price: Money,
    pub image_url: Option<String>,
    pub weight_grams: i32,
    pub height_cm: i32,
    pub width_cm: i32,
    pub length_cm: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A size/color combination with its own stock.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size: Option<String>,
    pub color: Option<String>,
    pub sku: Option<String>,
    pub stock: i32,
}

impl Variant {
    #[must_use]
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size.as_deref(), self.color.as_deref())
    }
}

/// A product together with its variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

impl ProductWithVariants {
    /// Units in stock across all variants.
    #[must_use]
    pub fn total_stock(&self) -> i64 {
        self.variants.iter().map(|v| i64::from(v.stock)).sum()
    }
}

/// Variant joined with the product fields checkout needs.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct VariantStock {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub price: Money,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock: i32,
    pub weight_grams: i32,
    pub height_cm: i32,
    pub width_cm: i32,
    pub length_cm: i32,
    pub active: bool,
}

impl VariantStock {
    #[must_use]
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size.as_deref(), self.color.as_deref())
    }
}

/// Product creation payload, also used by catalog seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub image_url: Option<String>,
    pub weight_grams: i32,
    pub height_cm: i32,
    pub width_cm: i32,
    pub length_cm: i32,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
}

/// Variant creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVariant {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub stock: i32,
}

impl NewProduct {
    /// Every problem with the payload, empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !is_valid_slug(&self.slug) {
            errors.push(
                "slug must be non-empty lowercase letters, digits and '-'".to_string(),
            );
        }
        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if self.price.is_negative() {
            errors.push("price cannot be negative".to_string());
        }
        errors.extend(measurement_errors(
            self.weight_grams,
            self.height_cm,
            self.width_cm,
            self.length_cm,
        ));

        if self.variants.is_empty() {
            errors.push("at least one variant is required".to_string());
        }
        let mut keys = HashSet::new();
        for (i, variant) in self.variants.iter().enumerate() {
            if variant.stock < 0 {
                errors.push(format!("variants[{i}].stock cannot be negative"));
            }
            let key = StockKey::new(
                ProductId::new(0),
                variant.size.as_deref(),
                variant.color.as_deref(),
            );
            if !keys.insert(key) {
                errors.push(format!("variants[{i}] duplicates another size/color"));
            }
        }

        errors
    }
}

/// Partial product update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub image_url: Option<String>,
    pub weight_grams: Option<i32>,
    pub height_cm: Option<i32>,
    pub width_cm: Option<i32>,
    pub length_cm: Option<i32>,
    pub active: Option<bool>,
}

impl ProductUpdate {
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            errors.push("name cannot be blank".to_string());
        }
        if self.price.is_some_and(|p| p.is_negative()) {
            errors.push("price cannot be negative".to_string());
        }
        errors.extend(measurement_errors(
            self.weight_grams.unwrap_or(1),
            self.height_cm.unwrap_or(1),
            self.width_cm.unwrap_or(1),
            self.length_cm.unwrap_or(1),
        ));
        errors
    }
}

/// Filter for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub include_inactive: bool,
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// A single product must fit in a parcel on its own.
fn measurement_errors(weight: i32, height: i32, width: i32, length: i32) -> Vec<String> {
    let mut errors = Vec::new();
    if weight <= 0 || weight.unsigned_abs() > MAX_WEIGHT_GRAMS {
        errors.push(format!(
            "weight_grams must be between 1 and {MAX_WEIGHT_GRAMS}"
        ));
    }
    for (name, value) in [
        ("height_cm", height),
        ("width_cm", width),
        ("length_cm", length),
    ] {
        if value <= 0 || value.unsigned_abs() > MAX_DIMENSION_CM {
            errors.push(format!("{name} must be between 1 and {MAX_DIMENSION_CM}"));
        }
    }
    errors
}

//! Back-office sales summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use tienda_core::{Money, OrderStatus, ProductId, VariantId};

/// Orders and revenue for a date range.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub order_count: i64,
    /// Total of processed and delivered orders.
    pub revenue: Money,
    pub average_order_value: Money,
    pub by_status: Vec<StatusCount>,
    pub top_products: Vec<TopProduct>,
    pub low_stock: Vec<LowStockVariant>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
    pub total: Money,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub units: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LowStockVariant {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub sku: Option<String>,
    pub stock: i32,
}

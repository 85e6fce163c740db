//! Back-office analytics queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use tienda_core::{Money, OrderStatus};

use super::RepositoryError;
use crate::models::{AnalyticsSummary, LowStockVariant, StatusCount, TopProduct};

/// Variants at or below this many units show up as low stock.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

const TOP_PRODUCTS_LIMIT: i64 = 10;

/// Repository for analytics queries.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Summarize orders created in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AnalyticsSummary, RepositoryError> {
        let by_status: Vec<StatusCount> = sqlx::query_as(
            r"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(total), 0) AS total
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY status
            ORDER BY status
            ",
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        let top_products: Vec<TopProduct> = sqlx::query_as(
            r"
            SELECT i.product_id,
                   MAX(i.product_name) AS product_name,
                   SUM(i.quantity)::BIGINT AS units,
                   COALESCE(SUM(i.line_total), 0) AS revenue
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.created_at >= $1 AND o.created_at < $2
              AND o.status IN ('PROCESSED', 'DELIVERED')
            GROUP BY i.product_id
            ORDER BY units DESC, revenue DESC
            LIMIT $3
            ",
        )
        .bind(from)
        .bind(to)
        .bind(TOP_PRODUCTS_LIMIT)
        .fetch_all(self.pool)
        .await?;

        let low_stock: Vec<LowStockVariant> = sqlx::query_as(
            r"
            SELECT v.id AS variant_id, v.product_id, p.name AS product_name,
                   v.size, v.color, v.sku, v.stock
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE p.active AND v.stock <= $1
            ORDER BY v.stock, p.name
            ",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(self.pool)
        .await?;

        Ok(summarize(from, to, by_status, top_products, low_stock))
    }
}

/// Revenue only counts orders that were paid.
fn summarize(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    by_status: Vec<StatusCount>,
    top_products: Vec<TopProduct>,
    low_stock: Vec<LowStockVariant>,
) -> AnalyticsSummary {
    let order_count = by_status.iter().map(|s| s.count).sum();

    let paid = by_status
        .iter()
        .filter(|s| matches!(s.status, OrderStatus::Processed | OrderStatus::Delivered));
    let (paid_count, revenue) = paid.fold((0_i64, Money::ZERO), |(count, revenue), s| {
        (count + s.count, revenue + s.total)
    });

    let average_order_value = if paid_count > 0 {
        Money::new(revenue.amount() / Decimal::from(paid_count))
    } else {
        Money::ZERO
    };

    AnalyticsSummary {
        from,
        to,
        order_count,
        revenue,
        average_order_value,
        by_status,
        top_products,
        low_stock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(status: OrderStatus, count: i64, cents: i64) -> StatusCount {
        StatusCount {
            status,
            count,
            total: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_summary_counts_only_paid_revenue() {
        let now = Utc::now();
        let summary = summarize(
            now,
            now,
            vec![
                count(OrderStatus::Pending, 4, 4_000_000),
                count(OrderStatus::Processed, 2, 3_000_000),
                count(OrderStatus::Delivered, 1, 1_500_000),
            ],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(summary.order_count, 7);
        assert_eq!(summary.revenue, Money::from_cents(4_500_000));
        assert_eq!(summary.average_order_value, Money::from_cents(1_500_000));
    }

    #[test]
    fn test_summary_without_paid_orders() {
        let now = Utc::now();
        let summary = summarize(
            now,
            now,
            vec![count(OrderStatus::PendingPayment, 3, 900_000)],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(summary.revenue, Money::ZERO);
        assert_eq!(summary.average_order_value, Money::ZERO);
    }
}

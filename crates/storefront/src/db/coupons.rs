//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use tienda_core::coupon::normalize_code;
use tienda_core::{Coupon, CouponId, Money};

use super::RepositoryError;

const COUPON_COLUMNS: &str =
    "id, code, discount_percent, active, expires_at, max_uses, used_count, min_purchase";

/// Coupon to insert. The code is stored upper-cased.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percent: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
    pub min_purchase: Option<Money>,
}

/// Repository for coupon operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by the code a customer typed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
        let coupon = sqlx::query_as(&sql)
            .bind(normalize_code(code))
            .fetch_optional(self.pool)
            .await?;
        Ok(coupon)
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC");
        let coupons = sqlx::query_as(&sql).fetch_all(self.pool).await?;
        Ok(coupons)
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code already exists.
    pub async fn create(&self, new: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            "INSERT INTO coupons (code, discount_percent, expires_at, max_uses, min_purchase) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COUPON_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(normalize_code(&new.code))
            .bind(new.discount_percent)
            .bind(new.expires_at)
            .bind(new.max_uses)
            .bind(new.min_purchase)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "coupon code already exists"))
    }

    /// Enable or disable a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn set_active(&self, id: CouponId, active: bool) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            "UPDATE coupons SET active = $2 WHERE id = $1 RETURNING {COUPON_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

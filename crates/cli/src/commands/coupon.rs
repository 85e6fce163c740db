//! Coupon management.
//!
//! ```bash
//! tienda coupon create --code VERANO10 --percent 10 --max-uses 100 \
//!     --min-purchase 20000 --expires-at 2026-03-01T00:00:00Z
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use tienda_core::Money;
use tienda_core::coupon::{normalize_code, validate_definition};
use tienda_storefront::db::{CouponRepository, NewCoupon};

use super::{CommandError, connect};

/// Options for a new coupon, as given on the command line.
#[derive(Debug, Clone)]
pub struct CouponOptions {
    pub code: String,
    pub percent: Decimal,
    pub min_purchase: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CouponOptions {
    /// Validate into a coupon ready to insert.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Invalid` if the definition is rejected or the
    /// expiry is already in the past.
    pub fn into_new_coupon(self, now: DateTime<Utc>) -> Result<NewCoupon, CommandError> {
        let min_purchase = self.min_purchase.map(Money::new);
        validate_definition(&self.code, self.percent, self.max_uses, min_purchase)
            .map_err(|e| CommandError::Invalid(e.to_string()))?;
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(CommandError::Invalid(
                "expires-at must be in the future".to_string(),
            ));
        }

        Ok(NewCoupon {
            code: normalize_code(&self.code),
            discount_percent: self.percent,
            expires_at: self.expires_at,
            max_uses: self.max_uses,
            min_purchase,
        })
    }
}

/// Create a coupon.
///
/// # Errors
///
/// Returns an error if the options are invalid, the code is taken or the
/// database is unreachable.
pub async fn create(options: CouponOptions) -> Result<(), CommandError> {
    let new = options.into_new_coupon(Utc::now())?;

    let pool = connect().await?;
    let coupon = CouponRepository::new(&pool).create(&new).await?;

    tracing::info!(
        coupon_id = %coupon.id,
        code = %coupon.code,
        percent = %coupon.discount_percent,
        "Coupon created"
    );
    Ok(())
}

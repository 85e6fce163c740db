//! Percentage coupons.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CouponId, Money};

/// Longest accepted coupon code.
pub const MAX_CODE_LENGTH: usize = 32;

/// A percentage-off coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: CouponId,
    /// Upper-case code customers type at checkout.
    pub code: String,
    /// Discount in percent, in `(0, 100]`.
    pub discount_percent: Decimal,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// `None` means unlimited.
    pub max_uses: Option<i32>,
    pub used_count: i32,
    /// Minimum cart subtotal for the coupon to apply.
    pub min_purchase: Option<Money>,
}

/// Why a coupon cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon expired on {0}")]
    Expired(DateTime<Utc>),
    #[error("coupon has reached its usage limit of {0}")]
    Exhausted(i32),
    #[error("coupon requires a minimum purchase of {minimum} (cart subtotal is {subtotal})")]
    BelowMinimum { minimum: Money, subtotal: Money },
    #[error("invalid coupon: {0}")]
    Invalid(String),
}

impl Coupon {
    /// Check the coupon against a cart subtotal at time `now`.
    ///
    /// Rules are checked in a fixed order: active flag, expiry, usage limit,
    /// minimum purchase. An expiry equal to `now` counts as expired.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponError`] that applies.
    pub fn validate(&self, subtotal: Money, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.active {
            return Err(CouponError::Inactive);
        }
        if let Some(expires_at) = self.expires_at
            && expires_at <= now
        {
            return Err(CouponError::Expired(expires_at));
        }
        if let Some(max_uses) = self.max_uses
            && self.used_count >= max_uses
        {
            return Err(CouponError::Exhausted(max_uses));
        }
        if let Some(minimum) = self.min_purchase
            && subtotal < minimum
        {
            return Err(CouponError::BelowMinimum { minimum, subtotal });
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`, never more than the subtotal.
    #[must_use]
    pub fn discount_for(&self, subtotal: Money) -> Money {
        subtotal.percent(self.discount_percent).min(subtotal)
    }
}

/// Normalize a customer-typed code for lookup.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Validate the definition of a new coupon.
///
/// # Errors
///
/// Returns [`CouponError::Invalid`] for an empty or malformed code, a percent
/// outside `(0, 100]`, a non-positive usage limit or a negative minimum.
pub fn validate_definition(
    code: &str,
    discount_percent: Decimal,
    max_uses: Option<i32>,
    min_purchase: Option<Money>,
) -> Result<(), CouponError> {
    let code = normalize_code(code);
    if code.is_empty() || code.len() > MAX_CODE_LENGTH {
        return Err(CouponError::Invalid(format!(
            "code must be 1-{MAX_CODE_LENGTH} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CouponError::Invalid(
            "code may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }
    if discount_percent <= Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(CouponError::Invalid(
            "discount percent must be greater than 0 and at most 100".to_string(),
        ));
    }
    if max_uses.is_some_and(|uses| uses <= 0) {
        return Err(CouponError::Invalid(
            "max uses must be positive".to_string(),
        ));
    }
    if min_purchase.is_some_and(|min| min.is_negative()) {
        return Err(CouponError::Invalid(
            "minimum purchase cannot be negative".to_string(),
        ));
    }
    Ok(())
}

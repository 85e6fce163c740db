//! Order total arithmetic.

use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Breakdown of what the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    /// `total = subtotal - discount + shipping`.
    ///
    /// The discount is capped at the subtotal, so shipping is never
    /// discounted and the total is never negative.
    #[must_use]
    pub fn compute(subtotal: Money, discount: Money, shipping: Money) -> Self {
        let discount = discount.min(subtotal);
        Self {
            subtotal,
            discount,
            shipping,
            total: subtotal.saturating_sub(discount) + shipping,
        }
    }

    /// Subtotal after the discount, before shipping.
    #[must_use]
    pub fn discounted_subtotal(&self) -> Money {
        self.subtotal.saturating_sub(self.discount)
    }
}

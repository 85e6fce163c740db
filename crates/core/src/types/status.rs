//! Status enums for orders and payments.
//!
//! Order status is a strictly linear lifecycle:
//!
//! ```text
//! PENDING -> PENDING_PAYMENT -> PROCESSED -> DELIVERED
//! ```
//!
//! Orders never move backward and never skip a step. The payment provider's
//! own view of a payment lives in [`PaymentStatus`], tracked beside the order
//! status rather than folded into it.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created, stock reserved, nothing paid yet.
    #[default]
    Pending,
    /// Waiting for the payment provider (or an offline payment) to settle.
    PendingPayment,
    /// Paid and being prepared for shipping.
    Processed,
    /// Handed to the customer. Terminal.
    Delivered,
}

/// Rejected order status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StatusTransitionError {
    /// The order is already in the requested status.
    #[error("order is already {0}")]
    Unchanged(OrderStatus),
    /// The order is in a terminal status.
    #[error("order is {0} and cannot change status")]
    Terminal(OrderStatus),
    /// The requested status comes before the current one.
    #[error("cannot move order back from {from} to {to}")]
    Backward {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },
    /// The requested status is more than one step ahead.
    #[error("cannot skip from {from} to {to}; next status is {next}")]
    Skipped {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
        /// The only allowed target.
        next: OrderStatus,
    },
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::PendingPayment,
        Self::Processed,
        Self::Delivered,
    ];

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::PendingPayment => 1,
            Self::Processed => 2,
            Self::Delivered => 3,
        }
    }

    /// The status that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::PendingPayment),
            Self::PendingPayment => Some(Self::Processed),
            Self::Processed => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Validate a move to `target`.
    ///
    /// Only the single step returned by [`next`](Self::next) is accepted.
    ///
    /// # Errors
    ///
    /// Returns a [`StatusTransitionError`] for same-state, backward, skipping
    /// or post-terminal moves.
    pub fn advance_to(self, target: Self) -> Result<Self, StatusTransitionError> {
        let Some(next) = self.next() else {
            return Err(StatusTransitionError::Terminal(self));
        };
        if self.rank() == target.rank() {
            return Err(StatusTransitionError::Unchanged(self));
        }
        if target.rank() < self.rank() {
            return Err(StatusTransitionError::Backward {
                from: self,
                to: target,
            });
        }
        if target.rank() != next.rank() {
            return Err(StatusTransitionError::Skipped {
                from: self,
                to: target,
                next,
            });
        }
        Ok(target)
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Processed => "PROCESSED",
            Self::Delivered => "DELIVERED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Hosted checkout at Mercado Pago.
    MercadoPago,
    /// Bank transfer confirmed manually by an admin.
    BankTransfer,
    /// Paid in cash when collecting at the store.
    CashOnPickup,
}

impl PaymentMethod {
    /// Whether checkout hands the customer off to the payment provider.
    #[must_use]
    pub const fn requires_redirect(self) -> bool {
        matches!(self, Self::MercadoPago)
    }
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "delivery_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Carrier delivery to the customer's address.
    Home,
    /// Carrier delivery to an agency for pickup.
    Agency,
    /// Collected at the store. No carrier involved.
    StorePickup,
}

impl DeliveryMethod {
    /// Whether the carrier has to be quoted for this method.
    #[must_use]
    pub const fn uses_carrier(self) -> bool {
        !matches!(self, Self::StorePickup)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_linear_path_is_accepted() {
        let mut status = OrderStatus::Pending;
        let mut visited = vec![status];
        while let Some(next) = status.next() {
            status = status.advance_to(next).unwrap();
            visited.push(status);
        }
        assert_eq!(visited, OrderStatus::ALL);
        assert!(status.is_terminal());
    }

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Processed)]
    #[case(OrderStatus::Pending, OrderStatus::Delivered)]
    #[case(OrderStatus::PendingPayment, OrderStatus::Delivered)]
    fn test_skipping_is_rejected(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(matches!(
            from.advance_to(to),
            Err(StatusTransitionError::Skipped { .. })
        ));
    }

    #[rstest]
    #[case(OrderStatus::PendingPayment, OrderStatus::Pending)]
    #[case(OrderStatus::Processed, OrderStatus::PendingPayment)]
    #[case(OrderStatus::Processed, OrderStatus::Pending)]
    fn test_backward_is_rejected(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert_eq!(
            from.advance_to(to),
            Err(StatusTransitionError::Backward { from, to })
        );
    }

    #[test]
    fn test_same_status_is_rejected() {
        assert_eq!(
            OrderStatus::Processed.advance_to(OrderStatus::Processed),
            Err(StatusTransitionError::Unchanged(OrderStatus::Processed))
        );
    }

    #[test]
    fn test_delivered_is_terminal() {
        for target in OrderStatus::ALL {
            assert_eq!(
                OrderStatus::Delivered.advance_to(target),
                Err(StatusTransitionError::Terminal(OrderStatus::Delivered))
            );
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::PendingPayment).unwrap(),
            "\"PENDING_PAYMENT\""
        );
        assert_eq!(
            "pending_payment".parse::<OrderStatus>().unwrap(),
            OrderStatus::PendingPayment
        );
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&PaymentMethod::MercadoPago).unwrap(),
            "\"mercado_pago\""
        );
    }

    #[test]
    fn test_payment_method_redirect() {
        assert!(PaymentMethod::MercadoPago.requires_redirect());
        assert!(!PaymentMethod::BankTransfer.requires_redirect());
        assert!(!PaymentMethod::CashOnPickup.requires_redirect());
    }
}

//! Order lifecycle: admin status advances and payment notifications.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use tienda_core::{OrderId, OrderStatus, PaymentStatus, StatusTransitionError};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::Order;
use crate::services::payments::{PaymentError, PaymentGateway};

/// Errors from order lifecycle operations.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The provider reported a payment we cannot tie to an order.
    #[error("payment {0} does not reference a known order")]
    UnknownReference(String),
}

/// Advance an order one step along its lifecycle.
///
/// # Errors
///
/// Returns `OrderServiceError::Transition` for illegal moves and
/// `RepositoryError::Conflict` when another request moved the order first.
#[instrument(skip(pool), fields(order_id = %id, target = %target))]
pub async fn advance(
    pool: &PgPool,
    id: OrderId,
    target: OrderStatus,
) -> Result<Order, OrderServiceError> {
    let repo = OrderRepository::new(pool);
    let order = repo.get(id).await?.ok_or(RepositoryError::NotFound)?;

    let next = order.status.advance_to(target)?;
    let updated = repo.update_status(id, order.status, next).await?;

    info!(from = %order.status, to = %updated.status, "Order advanced");
    Ok(updated)
}

/// Body of a payment provider notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    pub id: NotificationId,
}

/// Ids arrive as strings or numbers depending on the notification source.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NotificationId {
    Text(String),
    Number(u64),
}

impl PaymentNotification {
    /// The payment id, if this is a payment notification.
    #[must_use]
    pub fn payment_id(&self) -> Option<String> {
        if self.kind.as_deref() != Some("payment") {
            return None;
        }
        let id = match &self.data.as_ref()?.id {
            NotificationId::Text(id) => id.trim().to_string(),
            NotificationId::Number(id) => id.to_string(),
        };
        (!id.is_empty()).then_some(id)
    }
}

/// What a notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Not a payment notification.
    Ignored,
    /// Payment status recorded; the order did not move.
    Recorded {
        order_id: OrderId,
        payment: PaymentStatus,
    },
    /// Payment approved and the order moved to `PROCESSED`.
    Processed { order_id: OrderId },
}

/// Order status a payment result moves an order to, if any.
#[must_use]
pub const fn status_after_payment(current: OrderStatus, payment: PaymentStatus) -> Option<OrderStatus> {
    match (current, payment) {
        (OrderStatus::PendingPayment, PaymentStatus::Approved) => Some(OrderStatus::Processed),
        _ => None,
    }
}

/// Apply a payment provider notification.
///
/// The payment is fetched from the provider rather than trusted from the
/// notification body. Repeated notifications for the same payment are
/// harmless.
///
/// # Errors
///
/// Returns `OrderServiceError::UnknownReference` when the payment does not
/// point at an order, and provider or database errors otherwise.
#[instrument(skip(pool, gateway, notification), fields(kind = ?notification.kind, action = ?notification.action))]
pub async fn handle_payment_notification(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    notification: &PaymentNotification,
) -> Result<NotificationOutcome, OrderServiceError> {
    let Some(payment_id) = notification.payment_id() else {
        info!("Ignoring non-payment notification");
        return Ok(NotificationOutcome::Ignored);
    };

    let payment = gateway.get_payment(&payment_id).await?;
    let public_id = payment
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r.trim()).ok())
        .ok_or_else(|| OrderServiceError::UnknownReference(payment_id.clone()))?;

    let repo = OrderRepository::new(pool);
    let order = repo
        .get_by_public_id(public_id)
        .await?
        .ok_or_else(|| OrderServiceError::UnknownReference(payment_id.clone()))?;

    let order = repo
        .record_payment(order.id, &payment.id, payment.status)
        .await?;

    let Some(target) = status_after_payment(order.status, payment.status) else {
        info!(order_id = %order.id, payment = ?payment.status, "Payment recorded");
        return Ok(NotificationOutcome::Recorded {
            order_id: order.id,
            payment: payment.status,
        });
    };

    match repo.update_status(order.id, order.status, target).await {
        Ok(updated) => {
            info!(order_id = %updated.id, "Payment approved; order processed");
            Ok(NotificationOutcome::Processed {
                order_id: updated.id,
            })
        }
        // A concurrent notification for the same payment got there first.
        Err(RepositoryError::Conflict(_)) => {
            warn!(order_id = %order.id, "Order already moved by another notification");
            Ok(NotificationOutcome::Recorded {
                order_id: order.id,
                payment: payment.status,
            })
        }
        Err(e) => Err(e.into()),
    }
}

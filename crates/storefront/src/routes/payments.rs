//! Payment provider notifications.

use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::error::{ApiResponse, AppError, Result};
use crate::services::orders::{
    NotificationOutcome, OrderServiceError, PaymentNotification, handle_payment_notification,
};
use crate::services::payments::verify_webhook_signature;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
}

/// Mercado Pago notification endpoint.
///
/// When a webhook secret is configured the `x-signature` header must verify.
/// Notifications for payments that do not belong to one of our orders are
/// acknowledged so the provider stops retrying them.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookAck>> {
    let gateway = state
        .payments()
        .ok_or_else(|| AppError::BadRequest("Online payment is not enabled".to_string()))?;

    let notification: PaymentNotification = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid notification body: {e}")))?;

    if let Some(secret) = state
        .config()
        .mercadopago
        .as_ref()
        .and_then(|mp| mp.webhook_secret.as_ref())
    {
        let data_id = notification.payment_id().unwrap_or_default();
        verify_webhook_signature(
            secret,
            header_str(&headers, "x-signature"),
            header_str(&headers, "x-request-id"),
            &data_id,
        )?;
    }

    let processed = match handle_payment_notification(state.pool(), gateway, &notification).await {
        Ok(outcome) => matches!(outcome, NotificationOutcome::Processed { .. }),
        Err(OrderServiceError::UnknownReference(payment_id)) => {
            warn!(payment_id = %payment_id, "Notification for a payment with no matching order");
            false
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ApiResponse::ok(WebhookAck {
        received: true,
        processed,
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

//! Payment provider integration.
//!
//! Checkout only needs two things from a provider: a hosted payment page
//! for an order, and the current state of a payment when the provider
//! notifies us. [`PaymentGateway`] is that seam; [`MercadoPagoClient`] is
//! the production implementation.

pub mod mercadopago;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use tienda_core::{Money, PaymentStatus};

pub use mercadopago::{MercadoPagoClient, verify_webhook_signature};

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Online payment is not configured.
    #[error("payment provider is not configured")]
    NotConfigured,

    /// Webhook signature did not verify.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
}

/// What the provider needs to open a hosted payment page for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceRequest {
    /// Sent as the external reference and echoed back in notifications.
    pub order_public_id: Uuid,
    /// Line shown on the payment page.
    pub title: String,
    pub total: Money,
    pub payer_name: String,
    pub payer_email: String,
}

/// A hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub id: String,
    /// Where to send the customer.
    pub checkout_url: String,
}

/// A payment as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    pub id: String,
    pub status: PaymentStatus,
    /// Order public id the payment belongs to.
    pub external_reference: Option<String>,
}

/// A payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment page for an order.
    async fn create_preference(&self, request: &PreferenceRequest)
    -> Result<Preference, PaymentError>;

    /// Look up a payment by the id the provider notified us about.
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, PaymentError>;
}

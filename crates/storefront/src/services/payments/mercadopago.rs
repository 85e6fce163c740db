//! Mercado Pago Checkout Pro client.
//!
//! # API
//!
//! - `POST /checkout/preferences` creates a hosted payment page
//! - `GET /v1/payments/{id}` reads a payment after a notification
//!
//! Both use the account access token as a bearer token. Notifications carry
//! an `x-signature` header (`ts=...,v1=...`), an HMAC-SHA256 over
//! `id:{data.id};request-id:{x-request-id};ts:{ts};` keyed with the webhook
//! secret.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, instrument};
use url::Url;

use tienda_core::PaymentStatus;

use super::{PaymentError, PaymentGateway, PaymentInfo, Preference, PreferenceRequest};
use crate::config::MercadoPagoConfig;
use crate::security::constant_time_compare;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CURRENCY: &str = "ARS";
const SANDBOX_TOKEN_PREFIX: &str = "TEST-";
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Mercado Pago API client.
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: reqwest::Client,
    api_url: Url,
    access_token: SecretString,
    storefront_url: Url,
}

impl MercadoPagoClient {
    /// Create a client. `storefront_url` is the shop's public URL, used for
    /// return and notification URLs.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client fails to build.
    pub fn new(config: &MercadoPagoConfig, storefront_url: &Url) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url: with_trailing_slash(&config.api_url),
            access_token: config.access_token.clone(),
            storefront_url: with_trailing_slash(storefront_url),
        })
    }

    fn is_sandbox(&self) -> bool {
        self.access_token
            .expose_secret()
            .starts_with(SANDBOX_TOKEN_PREFIX)
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.api_url.join(path).map_err(|e| PaymentError::Api {
            status: 0,
            message: format!("invalid endpoint {path}: {e}"),
        })
    }

    fn storefront_link(&self, path: &str, order: Option<&str>) -> String {
        match self.storefront_url.join(path) {
            Ok(mut url) => {
                if let Some(order) = order {
                    url.query_pairs_mut().append_pair("order", order);
                }
                url.to_string()
            }
            Err(_) => self.storefront_url.to_string(),
        }
    }

    fn preference_body<'a>(&self, request: &'a PreferenceRequest) -> PreferenceBody<'a> {
        let reference = request.order_public_id.to_string();
        PreferenceBody {
            items: vec![PreferenceItem {
                id: reference.clone(),
                title: &request.title,
                quantity: 1,
                currency_id: CURRENCY,
                unit_price: request.total.amount().to_f64().unwrap_or_default(),
            }],
            payer: Payer {
                name: &request.payer_name,
                email: &request.payer_email,
            },
            back_urls: BackUrls {
                success: self.storefront_link("checkout/success", Some(&reference)),
                failure: self.storefront_link("checkout/failure", Some(&reference)),
                pending: self.storefront_link("checkout/pending", Some(&reference)),
            },
            auto_return: "approved",
            notification_url: self.storefront_link("api/payments/webhook", None),
            external_reference: reference,
        }
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, request), fields(order = %request.order_public_id))]
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, PaymentError> {
        let url = self.endpoint("checkout/preferences")?;
        let body = self.preference_body(request);

        let response = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let created: PreferenceResponse = Self::read(response).await?;

        let checkout_url = if self.is_sandbox() {
            created.sandbox_init_point.or(created.init_point)
        } else {
            created.init_point
        }
        .ok_or_else(|| PaymentError::Api {
            status: 200,
            message: "preference has no checkout URL".to_string(),
        })?;

        debug!(preference_id = %created.id, "Payment preference created");

        Ok(Preference {
            id: created.id,
            checkout_url,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentInfo, PaymentError> {
        let url = self.endpoint(&format!("v1/payments/{payment_id}"))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        let payment: PaymentResponse = Self::read(response).await?;

        Ok(PaymentInfo {
            id: id_to_string(&payment.id),
            status: map_status(&payment.status),
            external_reference: payment.external_reference.filter(|r| !r.is_empty()),
        })
    }
}

/// Map a Mercado Pago payment status to ours. Anything not final is pending.
#[must_use]
pub fn map_status(status: &str) -> PaymentStatus {
    match status {
        "approved" => PaymentStatus::Approved,
        "rejected" => PaymentStatus::Rejected,
        "cancelled" => PaymentStatus::Cancelled,
        "refunded" | "charged_back" => PaymentStatus::Refunded,
        _ => PaymentStatus::Pending,
    }
}

/// Verify the `x-signature` header of a payment notification.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the header is malformed or
/// the signature does not match.
pub fn verify_webhook_signature(
    secret: &SecretString,
    signature_header: &str,
    request_id: &str,
    data_id: &str,
) -> Result<(), PaymentError> {
    let mut ts = None;
    let mut v1 = None;
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }
    let ts = ts.ok_or_else(|| PaymentError::InvalidSignature("missing ts".to_string()))?;
    let v1 = v1.ok_or_else(|| PaymentError::InvalidSignature("missing v1".to_string()))?;

    let manifest = format!(
        "id:{};request-id:{request_id};ts:{ts};",
        data_id.to_lowercase()
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(manifest.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_compare(&expected, &v1.to_lowercase()) {
        return Err(PaymentError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }

    debug!("Payment notification signature verified");
    Ok(())
}

fn with_trailing_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        return url.clone();
    }
    let mut url = url.clone();
    let path = format!("{}/", url.path());
    url.set_path(&path);
    url
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "No error message".to_string()
            } else {
                body.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
            }
        })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct PreferenceBody<'a> {
    items: Vec<PreferenceItem<'a>>,
    payer: Payer<'a>,
    back_urls: BackUrls,
    auto_return: &'static str,
    notification_url: String,
    external_reference: String,
}

#[derive(Debug, Serialize)]
struct PreferenceItem<'a> {
    id: String,
    title: &'a str,
    quantity: u32,
    currency_id: &'static str,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct Payer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    #[serde(default)]
    init_point: Option<String>,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tienda_core::Money;
    use uuid::Uuid;

    fn client(token: &str) -> MercadoPagoClient {
        let config = MercadoPagoConfig {
            api_url: Url::parse("https://api.mercadopago.com").unwrap(),
            access_token: SecretString::from(token),
            webhook_secret: None,
        };
        MercadoPagoClient::new(&config, &Url::parse("https://tienda.com.ar").unwrap()).unwrap()
    }

    fn sign(secret: &str, manifest: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_map_status() {
        assert_eq!(map_status("approved"), PaymentStatus::Approved);
        assert_eq!(map_status("rejected"), PaymentStatus::Rejected);
        assert_eq!(map_status("cancelled"), PaymentStatus::Cancelled);
        assert_eq!(map_status("charged_back"), PaymentStatus::Refunded);
        assert_eq!(map_status("in_process"), PaymentStatus::Pending);
    }

    #[test]
    fn test_preference_body() {
        let public_id = Uuid::new_v4();
        let request = PreferenceRequest {
            order_public_id: public_id,
            title: "Pedido ABCD1234".to_string(),
            total: Money::from_cents(2_599_950),
            payer_name: "Ana".to_string(),
            payer_email: "ana@example.com".to_string(),
        };

        let body = serde_json::to_value(client("APP_USR-1").preference_body(&request)).unwrap();

        assert_eq!(body["external_reference"], public_id.to_string());
        assert_eq!(body["items"][0]["unit_price"], 25999.5);
        assert_eq!(body["items"][0]["currency_id"], "ARS");
        assert_eq!(
            body["notification_url"],
            "https://tienda.com.ar/api/payments/webhook"
        );
        assert_eq!(
            body["back_urls"]["success"],
            format!("https://tienda.com.ar/checkout/success?order={public_id}")
        );
    }

    #[test]
    fn test_sandbox_detection() {
        assert!(client("TEST-123").is_sandbox());
        assert!(!client("APP_USR-123").is_sandbox());
    }

    #[test]
    fn test_webhook_signature_valid() {
        let secret = SecretString::from("webhook-key");
        let v1 = sign("webhook-key", "id:123456;request-id:req-1;ts:1704908010;");
        let header = format!("ts=1704908010,v1={v1}");

        assert!(verify_webhook_signature(&secret, &header, "req-1", "123456").is_ok());
    }

    #[test]
    fn test_webhook_signature_mismatch() {
        let secret = SecretString::from("webhook-key");
        let v1 = sign("webhook-key", "id:123456;request-id:req-1;ts:1704908010;");
        let header = format!("ts=1704908010,v1={v1}");

        let result = verify_webhook_signature(&secret, &header, "req-1", "999999");
        assert!(matches!(result, Err(PaymentError::InvalidSignature(_))));
    }

    #[test]
    fn test_webhook_signature_malformed() {
        let secret = SecretString::from("webhook-key");
        assert!(verify_webhook_signature(&secret, "garbage", "req-1", "1").is_err());
        assert!(verify_webhook_signature(&secret, "ts=1", "req-1", "1").is_err());
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"message":"invalid token"}"#), "invalid token");
        assert_eq!(error_message(""), "No error message");
    }
}

//! Correo Argentino `MiCorreo` REST client.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use super::CorreoError;
use super::agencies::{Agency, AgencyQuery, AgencyService};
use super::auth::{CorreoToken, authenticate};
use super::postal::ProvinceCode;
use super::rates::{RateQuote, RateRequest};
use super::shipments::{ImportReceipt, ShipmentImport};

/// Production API.
pub const PRODUCTION_URL: &str = "https://api.correoargentino.com.ar/micorreo/v1";
/// Sandbox API.
pub const SANDBOX_URL: &str = "https://apitest.correoargentino.com.ar/micorreo/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const AGENCY_CACHE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Connection settings for [`CorreoClient`].
#[derive(Clone)]
pub struct CorreoClientConfig {
    /// API root, always ending in `/`.
    pub base_url: Url,
    pub user: String,
    pub password: SecretString,
    /// Account customer id; required for rates, agencies and imports.
    pub customer_id: Option<String>,
    pub timeout: Duration,
    pub agency_cache_ttl: Duration,
}

impl CorreoClientConfig {
    /// Build a config with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::InvalidUrl` if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        user: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, CorreoError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            user: user.into(),
            password,
            customer_id: None,
            timeout: DEFAULT_TIMEOUT,
            agency_cache_ttl: AGENCY_CACHE_TTL,
        })
    }

    #[must_use]
    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}

impl std::fmt::Debug for CorreoClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorreoClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("customer_id", &self.customer_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn normalize_base_url(base_url: &str) -> Result<Url, CorreoError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    Ok(Url::parse(&format!("{trimmed}/"))?)
}

/// Correo Argentino API client.
///
/// Cheap to clone; clones share the token and the agency cache.
///
/// # Authentication
///
/// Tokens are obtained on demand from the configured credentials and cached
/// in memory until shortly before they expire.
#[derive(Clone)]
pub struct CorreoClient {
    inner: Arc<CorreoClientInner>,
}

struct CorreoClientInner {
    client: reqwest::Client,
    config: CorreoClientConfig,
    /// In-memory token cache
    token: RwLock<Option<CorreoToken>>,
    agencies: Cache<(ProvinceCode, Option<AgencyService>), Arc<Vec<Agency>>>,
}

#[derive(Serialize)]
struct ValidateUserRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateUserResponse {
    customer_id: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl CorreoClient {
    /// Create a client. No request is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::Http` if the HTTP client cannot be built.
    pub fn new(config: CorreoClientConfig) -> Result<Self, CorreoError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let agencies = Cache::builder()
            .max_capacity(64)
            .time_to_live(config.agency_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(CorreoClientInner {
                client,
                config,
                token: RwLock::new(None),
                agencies,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CorreoClientConfig {
        &self.inner.config
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Current bearer token, authenticating first if there is none or it is
    /// about to expire.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::AuthenticationFailed` if the credentials are
    /// rejected.
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> Result<SecretString, CorreoError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.token.clone());
        }

        let mut guard = self.inner.token.write().await;

        // Another task may have authenticated while we waited for the lock
        if let Some(token) = guard.as_ref()
            && !token.is_expired()
        {
            return Ok(token.token.clone());
        }

        let config = &self.inner.config;
        let token = authenticate(
            &self.inner.client,
            &config.base_url,
            &config.user,
            &config.password,
        )
        .await?;
        debug!(expires_at = %token.expires_at, "Obtained Correo Argentino token");

        let secret = token.token.clone();
        *guard = Some(token);
        Ok(secret)
    }

    /// Set the token directly.
    pub async fn set_token(&self, token: CorreoToken) {
        *self.inner.token.write().await = Some(token);
    }

    /// Get the current token (if set).
    pub async fn get_token(&self) -> Option<CorreoToken> {
        self.inner.token.read().await.clone()
    }

    /// Check if we have a valid (non-expired) token.
    pub async fn has_valid_token(&self) -> bool {
        self.inner
            .token
            .read()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_expired())
    }

    /// Clear the cached token.
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Look up the customer id of a `MiCorreo` account.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::NotFound` or `CorreoError::Api` if the account
    /// credentials are rejected.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn validate_user(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<String, CorreoError> {
        let body = ValidateUserRequest {
            email,
            password: password.expose_secret(),
        };
        let response: ValidateUserResponse = self
            .send(Method::POST, self.endpoint("users/validate")?, |r| {
                r.json(&body)
            })
            .await?;
        Ok(response.customer_id)
    }

    /// Quote a validated rate request.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError` on authentication, network or API failures.
    #[instrument(
        skip(self, request),
        fields(
            from = %request.postal_code_origin,
            to = %request.postal_code_destination,
            weight = request.dimensions.weight,
        )
    )]
    pub async fn rates(&self, request: &RateRequest) -> Result<RateQuote, CorreoError> {
        let customer_id = self.customer_id()?;
        let body = request.to_wire(customer_id);
        let quote: RateQuote = self
            .send(Method::POST, self.endpoint("rates")?, |r| r.json(&body))
            .await?;
        debug!(count = quote.rates.len(), "Received rates");
        Ok(quote)
    }

    /// Agencies in a province, cached per province and service filter.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError` on authentication, network or API failures.
    #[instrument(skip(self), fields(province = %query.province))]
    pub async fn agencies(&self, query: &AgencyQuery) -> Result<Vec<Agency>, CorreoError> {
        let key = query.cache_key();

        let agencies = if let Some(cached) = self.inner.agencies.get(&key).await {
            debug!("Agency cache hit");
            cached
        } else {
            let mut url = self.endpoint("agencies")?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("customerId", self.customer_id()?)
                    .append_pair("provinceCode", &query.province.to_string());
                if let Some(service) = query.services {
                    pairs.append_pair("services", service.as_str());
                }
            }
            let fetched: Vec<Agency> = self.send(Method::GET, url, |r| r).await?;
            let fetched = Arc::new(fetched);
            self.inner.agencies.insert(key, Arc::clone(&fetched)).await;
            fetched
        };

        Ok(agencies
            .iter()
            .filter(|agency| query.include_inactive || agency.is_active())
            .cloned()
            .collect())
    }

    /// Register a validated shipment with the carrier.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError` on authentication, network or API failures.
    #[instrument(
        skip(self, shipment),
        fields(
            ext_order_id = %shipment.ext_order_id,
            delivery_type = %shipment.delivery.delivery_type(),
        )
    )]
    pub async fn import_shipment(
        &self,
        shipment: &ShipmentImport,
    ) -> Result<ImportReceipt, CorreoError> {
        let customer_id = self.customer_id()?;
        let body = shipment.to_wire(customer_id);
        self.send(Method::POST, self.endpoint("shipping/import")?, |r| {
            r.json(&body)
        })
        .await
    }

    // =========================================================================
    // Transport
    // =========================================================================

    fn endpoint(&self, path: &str) -> Result<Url, CorreoError> {
        Ok(self.inner.config.base_url.join(path)?)
    }

    fn customer_id(&self) -> Result<&str, CorreoError> {
        self.inner.config.customer_id.as_deref().ok_or_else(|| {
            CorreoError::Validation(vec![
                "customerId is not configured (see `tienda correo customer-id`)".to_string(),
            ])
        })
    }

    /// Send an authenticated request and decode a JSON response.
    async fn send<T, F>(&self, method: Method, url: Url, build: F) -> Result<T, CorreoError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let token = self.access_token().await?;

        let request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret());
        let response = build(request).send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(CorreoError::RateLimited(retry_after));
        }

        // Check for unauthorized
        if status == StatusCode::UNAUTHORIZED {
            warn!("Correo Argentino rejected the token, clearing it");
            self.clear_token().await;
            return Err(CorreoError::TokenExpired);
        }

        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(CorreoError::NotFound(error_message(&text)));
        }

        if !status.is_success() {
            return Err(CorreoError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Message from an error body: `message`, then `error`, then the raw text.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(body)
        && let Some(message) = parsed.message.or(parsed.error)
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "No error message".to_string();
    }
    trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> CorreoClientConfig {
        CorreoClientConfig::new(SANDBOX_URL, "tienda", SecretString::from("secret")).unwrap()
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = config();
        assert_eq!(
            config.base_url.as_str(),
            "https://apitest.correoargentino.com.ar/micorreo/v1/"
        );
        assert_eq!(
            config.base_url.join("shipping/import").unwrap().as_str(),
            "https://apitest.correoargentino.com.ar/micorreo/v1/shipping/import"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = CorreoClientConfig::new("not a url", "u", SecretString::from("p"));
        assert!(matches!(result, Err(CorreoError::InvalidUrl(_))));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let debug = format!("{:?}", config());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn test_client_starts_without_token() {
        let client = CorreoClient::new(config()).unwrap();
        assert!(!client.has_valid_token().await);
        assert!(client.get_token().await.is_none());
    }

    #[test]
    fn test_customer_id_required() {
        let client = CorreoClient::new(config()).unwrap();
        assert!(client.customer_id().unwrap_err().is_validation());

        let client = CorreoClient::new(config().with_customer_id("0001234567")).unwrap();
        assert_eq!(client.customer_id().unwrap(), "0001234567");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message": "Código postal inválido"}"#), "Código postal inválido");
        assert_eq!(error_message(r#"{"error": "Bad Request"}"#), "Bad Request");
        assert_eq!(error_message("Gateway Timeout"), "Gateway Timeout");
        assert_eq!(error_message("  "), "No error message");
        assert_eq!(error_message(&"x".repeat(900)).len(), MAX_ERROR_MESSAGE_LEN);
    }
}

//! Correo Argentino `MiCorreo` API client.
//!
//! Quotes shipping rates, looks up agencies (sucursales) and imports shipments
//! into the carrier's system so labels can be printed from their panel.
//!
//! # Architecture
//!
//! - HTTP Basic credentials -> short-lived bearer token -> API
//! - Token cached in memory until shortly before it expires, then obtained
//!   again on the next call
//! - The API only accepts integer grams and centimetres; [`units`] converts
//!   whatever the catalog stores, rounding up
//! - Requests are validated locally before anything is sent, and every
//!   problem is reported at once
//! - Agency listings are cached per province for an hour via `moka`
//!
//! There is no retry: a failed call is returned to the caller as is. A 401
//! drops the cached token so the next call authenticates again.
//!
//! # Example
//!
//! ```rust,ignore
//! use tienda_correo::{CorreoClient, CorreoClientConfig, PackageInput, RateRequest};
//!
//! let client = CorreoClient::new(config)?;
//! let request = RateRequest::new("1425", "C5000ABC", None, &PackageInput::grams_cm(1200, 30, 20, 10))?;
//! let quote = client.rates(&request).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod agencies;
pub mod auth;
pub mod client;
pub mod postal;
pub mod rates;
pub mod shipments;
pub mod units;

pub use agencies::{Agency, AgencyQuery, AgencyService};
pub use auth::CorreoToken;
pub use client::{CorreoClient, CorreoClientConfig};
pub use postal::{PostalCode, ProvinceCode};
pub use rates::{DeliveryType, Rate, RateQuote, RateRequest};
pub use shipments::{
    Address, AddressInput, Delivery, ImportReceipt, Recipient, Sender, ShipmentImport,
    ShipmentImportRequest,
};
pub use units::{LengthUnit, Package, PackageInput, WeightUnit};

use thiserror::Error;

/// Errors that can occur when talking to the Correo Argentino API.
#[derive(Debug, Error)]
pub enum CorreoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request failed local validation and was not sent.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The carrier rejected the bearer token.
    #[error("Access token expired")]
    TokenExpired,

    /// Rate limited by the carrier.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("Correo API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The configured base URL cannot be used.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl CorreoError {
    /// Whether the error was caused by the caller's input rather than the
    /// carrier or the network.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Validation problems, if this is a validation error.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

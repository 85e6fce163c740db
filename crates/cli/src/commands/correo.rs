//! Carrier diagnostics.
//!
//! ```bash
//! # Look up the account's customer id
//! tienda correo customer-id --email tienda@example.com --password '...'
//!
//! # Agencies in a province
//! tienda correo agencies B
//!
//! # Quote a parcel from the store's postal code
//! tienda correo rates --to 5000 --weight 800 --height 10 --width 20 --length 30
//! ```
//!
//! Uses the same `CORREO_*` variables as the storefront.

use secrecy::SecretString;
use tracing::info;

use tienda_correo::{
    AgencyQuery, CorreoClient, DeliveryType, PackageInput, ProvinceCode, RateRequest,
};
use tienda_storefront::config::CorreoConfig;

use super::CommandError;

fn client() -> Result<(CorreoClient, CorreoConfig), CommandError> {
    let config = CorreoConfig::from_env()?;
    let client = CorreoClient::new(config.client.clone())?;
    Ok((client, config))
}

/// Print the customer id for a MiCorreo account.
///
/// # Errors
///
/// Returns an error if the carrier rejects the credentials.
pub async fn customer_id(email: &str, password: SecretString) -> Result<(), CommandError> {
    let (client, _) = client()?;
    let customer_id = client.validate_user(email, &password).await?;
    info!(%customer_id, "Set CORREO_CUSTOMER_ID to this value");
    Ok(())
}

/// List agencies in a province.
///
/// # Errors
///
/// Returns an error for an unknown province or a carrier failure.
pub async fn agencies(province: &str, include_inactive: bool) -> Result<(), CommandError> {
    let province: ProvinceCode = province.parse().map_err(CommandError::Invalid)?;
    let (client, _) = client()?;

    let query = AgencyQuery {
        province,
        services: None,
        include_inactive,
    };
    let agencies = client.agencies(&query).await?;

    info!(count = agencies.len(), %province, "Agencies");
    for agency in &agencies {
        info!(
            code = %agency.code,
            name = %agency.name,
            status = %agency.status,
            "  agency"
        );
    }
    Ok(())
}

/// Parcel and destination for a quote.
#[derive(Debug, Clone)]
pub struct RateOptions {
    pub from: Option<String>,
    pub to: String,
    pub delivery: Option<DeliveryType>,
    pub weight_grams: u32,
    pub height_cm: u32,
    pub width_cm: u32,
    pub length_cm: u32,
}

/// Quote a parcel.
///
/// # Errors
///
/// Returns an error for invalid postal codes or measurements, or a carrier
/// failure.
pub async fn rates(options: RateOptions) -> Result<(), CommandError> {
    let (client, config) = client()?;
    let origin = options
        .from
        .unwrap_or_else(|| config.origin_postal_code.as_str().to_string());

    let package = PackageInput::grams_cm(
        options.weight_grams,
        options.height_cm,
        options.width_cm,
        options.length_cm,
    );
    let request = RateRequest::new(&origin, &options.to, options.delivery, &package)?;
    let quote = client.rates(&request).await?;

    info!(
        from = %origin,
        to = %options.to,
        valid_to = ?quote.valid_to,
        "{} rate(s)",
        quote.rates.len()
    );
    for rate in &quote.rates {
        info!(
            delivery = rate.delivered_type.code(),
            product = %rate.product_name,
            price = %rate.price,
            days = ?(rate.delivery_time_min, rate.delivery_time_max),
            "  rate"
        );
    }
    Ok(())
}

//! Shipping rate quotes.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::CorreoError;
use crate::postal::PostalCode;
use crate::units::{Package, PackageInput};

/// How the parcel reaches the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryType {
    /// Home delivery (domicilio).
    #[serde(rename = "D")]
    Home,
    /// Pickup at a carrier agency (sucursal).
    #[serde(rename = "S")]
    Agency,
}

impl DeliveryType {
    /// The single-letter code used on the wire.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Home => "D",
            Self::Agency => "S",
        }
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for DeliveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "D" => Ok(Self::Home),
            "S" => Ok(Self::Agency),
            other => Err(format!("invalid delivery type: {other:?} (expected D or S)")),
        }
    }
}

/// A validated rate request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    pub postal_code_origin: PostalCode,
    pub postal_code_destination: PostalCode,
    /// `None` quotes both home and agency delivery.
    pub delivered_type: Option<DeliveryType>,
    pub dimensions: Package,
}

impl RateRequest {
    /// Validate and normalize a rate request.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::Validation` listing every invalid postal code
    /// and measurement.
    pub fn new(
        origin: &str,
        destination: &str,
        delivered_type: Option<DeliveryType>,
        package: &PackageInput,
    ) -> Result<Self, CorreoError> {
        let mut errors = Vec::new();

        let origin = PostalCode::parse(origin)
            .map_err(|e| errors.push(format!("postalCodeOrigin: {e}")))
            .ok();
        let destination = PostalCode::parse(destination)
            .map_err(|e| errors.push(format!("postalCodeDestination: {e}")))
            .ok();
        let dimensions = package.normalize().map_err(|e| errors.extend(e)).ok();

        match (origin, destination, dimensions) {
            (Some(postal_code_origin), Some(postal_code_destination), Some(dimensions))
                if errors.is_empty() =>
            {
                Ok(Self {
                    postal_code_origin,
                    postal_code_destination,
                    delivered_type,
                    dimensions,
                })
            }
            _ => Err(CorreoError::Validation(errors)),
        }
    }

    pub(crate) fn to_wire<'a>(&'a self, customer_id: &'a str) -> RateRequestBody<'a> {
        RateRequestBody {
            customer_id,
            postal_code_origin: self.postal_code_origin.as_str(),
            postal_code_destination: self.postal_code_destination.as_str(),
            delivered_type: self.delivered_type,
            dimensions: self.dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RateRequestBody<'a> {
    customer_id: &'a str,
    postal_code_origin: &'a str,
    postal_code_destination: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivered_type: Option<DeliveryType>,
    dimensions: Package,
}

/// Rates returned by the carrier for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    /// Until when the quoted prices hold, as sent by the carrier.
    #[serde(default)]
    pub valid_to: Option<String>,
    #[serde(default)]
    pub rates: Vec<Rate>,
}

impl RateQuote {
    /// Lowest-priced rate, optionally restricted to one delivery type.
    #[must_use]
    pub fn cheapest(&self, delivered_type: Option<DeliveryType>) -> Option<&Rate> {
        self.rates
            .iter()
            .filter(|r| delivered_type.is_none_or(|t| r.delivered_type == t))
            .min_by_key(|r| r.price)
    }
}

/// One service option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub delivered_type: DeliveryType,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub product_name: String,
    pub price: Decimal,
    /// Business days.
    #[serde(default, deserialize_with = "lenient_days")]
    pub delivery_time_min: Option<u32>,
    /// Business days.
    #[serde(default, deserialize_with = "lenient_days")]
    pub delivery_time_max: Option<u32>,
}

/// Delivery times come back as `"2"`, `2` or `""` depending on the product.
fn lenient_days<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Days {
        Number(u32),
        Text(String),
    }

    Ok(match Option::<Days>::deserialize(deserializer)? {
        Some(Days::Number(n)) => Some(n),
        Some(Days::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_postal_codes() {
        let request = RateRequest::new(
            "1425",
            "X5000ABC",
            Some(DeliveryType::Agency),
            &PackageInput::grams_cm(1200, 10, 20, 30),
        )
        .unwrap();
        assert_eq!(request.postal_code_destination.as_str(), "5000");

        let body = serde_json::to_value(request.to_wire("0001234567")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "customerId": "0001234567",
                "postalCodeOrigin": "1425",
                "postalCodeDestination": "5000",
                "deliveredType": "S",
                "dimensions": {"weight": 1200, "height": 10, "width": 20, "length": 30}
            })
        );
    }

    #[test]
    fn test_wire_omits_delivery_type_when_unset() {
        let request =
            RateRequest::new("1425", "5000", None, &PackageInput::grams_cm(1, 1, 1, 1)).unwrap();
        let body = serde_json::to_value(request.to_wire("1")).unwrap();
        assert!(body.get("deliveredType").is_none());
    }

    #[test]
    fn test_new_reports_everything_at_once() {
        let err = RateRequest::new("abc", "5000", None, &PackageInput::grams_cm(0, 151, 10, 10))
            .unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("postalCodeOrigin"));
    }

    #[test]
    fn test_rate_quote_parses_mixed_delivery_times() {
        let quote: RateQuote = serde_json::from_str(
            r#"{
                "customerId": "0001234567",
                "validTo": "2024-05-02T00:00:00.000-03:00",
                "rates": [
                    {"deliveredType": "D", "productType": "CP", "productName": "Correo Argentino Clasico",
                     "price": 5320.5, "deliveryTimeMin": "2", "deliveryTimeMax": "5"},
                    {"deliveredType": "S", "productType": "CP", "productName": "Correo Argentino Clasico",
                     "price": 4100, "deliveryTimeMin": 2, "deliveryTimeMax": ""}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(quote.rates.len(), 2);
        assert_eq!(quote.rates[0].delivery_time_max, Some(5));
        assert_eq!(quote.rates[1].delivery_time_min, Some(2));
        assert_eq!(quote.rates[1].delivery_time_max, None);

        let cheapest = quote.cheapest(None).unwrap();
        assert_eq!(cheapest.delivered_type, DeliveryType::Agency);
        let home = quote.cheapest(Some(DeliveryType::Home)).unwrap();
        assert_eq!(home.price, Decimal::new(53205, 1));
    }

    #[test]
    fn test_delivery_type_from_str() {
        assert_eq!("d".parse::<DeliveryType>().unwrap(), DeliveryType::Home);
        assert_eq!(" S ".parse::<DeliveryType>().unwrap(), DeliveryType::Agency);
        assert!("X".parse::<DeliveryType>().is_err());
    }
}

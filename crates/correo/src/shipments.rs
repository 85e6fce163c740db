//! Shipment import.
//!
//! Importing a shipment registers it in the carrier's panel, where the label
//! is printed. What is required depends on the delivery type: home delivery
//! (`D`) needs a full destination address, agency pickup (`S`) needs the
//! agency code. Requests arrive loose from JSON and are validated into a
//! [`ShipmentImport`] before anything is sent.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tienda_core::Email;

use crate::CorreoError;
use crate::postal::{PostalCode, ProvinceCode};
use crate::rates::DeliveryType;
use crate::units::{Package, PackageInput};

/// Product type for standard parcels ("Correo Argentino Clásico").
pub const DEFAULT_PRODUCT_TYPE: &str = "CP";

const MAX_NAME_LENGTH: usize = 100;

/// A validated street address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street_name: String,
    pub street_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    pub city: String,
    pub province_code: ProvinceCode,
    pub postal_code: PostalCode,
}

/// An address as received, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub apartment: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province_code: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl From<&Address> for AddressInput {
    fn from(address: &Address) -> Self {
        Self {
            street_name: Some(address.street_name.clone()),
            street_number: Some(address.street_number.clone()),
            floor: address.floor.clone(),
            apartment: address.apartment.clone(),
            city: Some(address.city.clone()),
            province_code: Some(address.province_code.to_string()),
            postal_code: Some(address.postal_code.to_string()),
        }
    }
}

impl AddressInput {
    /// Validate, pushing one message per problem prefixed with `field`.
    pub fn validate(&self, field: &str, errors: &mut Vec<String>) -> Option<Address> {
        let start = errors.len();

        let street_name = required(&self.street_name, field, "streetName", errors);
        let street_number = required(&self.street_number, field, "streetNumber", errors);
        let city = required(&self.city, field, "city", errors);

        let province_code = match non_blank(&self.province_code) {
            Some(code) => code
                .parse::<ProvinceCode>()
                .map_err(|e| errors.push(format!("{field}.provinceCode: {e}")))
                .ok(),
            None => {
                errors.push(format!("{field}.provinceCode is required"));
                None
            }
        };
        let postal_code = match non_blank(&self.postal_code) {
            Some(code) => PostalCode::parse(code)
                .map_err(|e| errors.push(format!("{field}.postalCode: {e}")))
                .ok(),
            None => {
                errors.push(format!("{field}.postalCode is required"));
                None
            }
        };

        if errors.len() > start {
            return None;
        }

        Some(Address {
            street_name: street_name?,
            street_number: street_number?,
            floor: non_blank(&self.floor).map(str::to_string),
            apartment: non_blank(&self.apartment).map(str::to_string),
            city: city?,
            province_code: province_code?,
            postal_code: postal_code?,
        })
    }
}

/// Who ships the parcel: the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub origin_address: Address,
}

/// Who receives the parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub email: Email,
}

/// Where the parcel goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Home { address: Address },
    Agency { agency_code: String },
}

impl Delivery {
    #[must_use]
    pub const fn delivery_type(&self) -> DeliveryType {
        match self {
            Self::Home { .. } => DeliveryType::Home,
            Self::Agency { .. } => DeliveryType::Agency,
        }
    }
}

/// Shipment import as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentImportRequest {
    /// Our reference for the shipment, usually the order's public id.
    pub ext_order_id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub recipient_phone: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    /// `D` or `S`.
    pub delivery_type: String,
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub agency_code: Option<String>,
    pub package: PackageInput,
    pub declared_value: Decimal,
    #[serde(default)]
    pub product_type: Option<String>,
}

impl ShipmentImportRequest {
    /// Validate into a [`ShipmentImport`] sent on behalf of `sender`.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::Validation` listing every problem found.
    pub fn validate(&self, sender: Sender) -> Result<ShipmentImport, CorreoError> {
        let mut errors = Vec::new();

        let ext_order_id = self.ext_order_id.trim();
        if ext_order_id.is_empty() {
            errors.push("extOrderId is required".to_string());
        }

        let recipient_name = required(&self.recipient_name, "recipient", "name", &mut errors);
        if let Some(name) = &recipient_name
            && name.chars().count() > MAX_NAME_LENGTH
        {
            errors.push(format!(
                "recipient.name must be at most {MAX_NAME_LENGTH} characters"
            ));
        }
        let recipient_email = match non_blank(&self.recipient_email) {
            Some(email) => Email::parse(email)
                .map_err(|e| errors.push(format!("recipient.email: {e}")))
                .ok(),
            None => {
                errors.push("recipient.email is required".to_string());
                None
            }
        };

        let delivery = match self.delivery_type.parse::<DeliveryType>() {
            Ok(DeliveryType::Home) => match &self.address {
                Some(address) => address
                    .validate("address", &mut errors)
                    .map(|address| Delivery::Home { address }),
                None => {
                    errors.push("address is required for home delivery (D)".to_string());
                    None
                }
            },
            Ok(DeliveryType::Agency) => match non_blank(&self.agency_code) {
                Some(code) => Some(Delivery::Agency {
                    agency_code: code.to_string(),
                }),
                None => {
                    errors.push("agencyCode is required for agency pickup (S)".to_string());
                    None
                }
            },
            Err(e) => {
                errors.push(format!("deliveryType: {e}"));
                None
            }
        };

        let package = self.package.normalize().map_err(|e| errors.extend(e)).ok();

        if self.declared_value <= Decimal::ZERO {
            errors.push("declaredValue must be greater than zero".to_string());
        }

        match (recipient_name, recipient_email, delivery, package) {
            (Some(name), Some(email), Some(delivery), Some(package)) if errors.is_empty() => {
                Ok(ShipmentImport {
                    ext_order_id: ext_order_id.to_string(),
                    order_number: non_blank(&self.order_number).map(str::to_string),
                    sender,
                    recipient: Recipient {
                        name,
                        phone: non_blank(&self.recipient_phone).map(str::to_string),
                        email,
                    },
                    delivery,
                    package,
                    declared_value: self.declared_value,
                    product_type: non_blank(&self.product_type)
                        .unwrap_or(DEFAULT_PRODUCT_TYPE)
                        .to_string(),
                })
            }
            _ => Err(CorreoError::Validation(errors)),
        }
    }
}

/// A shipment that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentImport {
    pub ext_order_id: String,
    pub order_number: Option<String>,
    pub sender: Sender,
    pub recipient: Recipient,
    pub delivery: Delivery,
    pub package: Package,
    pub declared_value: Decimal,
    pub product_type: String,
}

impl ShipmentImport {
    pub(crate) fn to_wire<'a>(&'a self, customer_id: &'a str) -> ShipmentImportBody<'a> {
        let (agency, address) = match &self.delivery {
            Delivery::Home { address } => (None, Some(address)),
            Delivery::Agency { agency_code } => (Some(agency_code.as_str()), None),
        };

        ShipmentImportBody {
            customer_id,
            ext_order_id: &self.ext_order_id,
            order_number: self.order_number.as_deref().unwrap_or(&self.ext_order_id),
            sender: &self.sender,
            recipient: &self.recipient,
            shipping: ShippingBody {
                delivery_type: self.delivery.delivery_type(),
                product_type: &self.product_type,
                agency,
                address,
                weight: self.package.weight,
                declared_value: self.declared_value.to_f64().unwrap_or_default(),
                height: self.package.height,
                length: self.package.length,
                width: self.package.width,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShipmentImportBody<'a> {
    customer_id: &'a str,
    ext_order_id: &'a str,
    order_number: &'a str,
    sender: &'a Sender,
    recipient: &'a Recipient,
    shipping: ShippingBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShippingBody<'a> {
    delivery_type: DeliveryType,
    product_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    agency: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a Address>,
    weight: u32,
    declared_value: f64,
    height: u32,
    length: u32,
    width: u32,
}

/// Carrier acknowledgement of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReceipt {
    #[serde(default)]
    pub created_at: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required(
    value: &Option<String>,
    field: &str,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<String> {
    let value = non_blank(value).map(str::to_string);
    if value.is_none() {
        errors.push(format!("{field}.{name} is required"));
    }
    value
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sender() -> Sender {
        Sender {
            name: "Tienda".to_string(),
            phone: None,
            email: Some("envios@tienda.com.ar".to_string()),
            origin_address: Address {
                street_name: "Av. Corrientes".to_string(),
                street_number: "1234".to_string(),
                floor: None,
                apartment: None,
                city: "CABA".to_string(),
                province_code: ProvinceCode::CiudadAutonoma,
                postal_code: PostalCode::parse("1043").unwrap(),
            },
        }
    }

    fn home_address() -> AddressInput {
        AddressInput {
            street_name: Some("Bv. San Juan".to_string()),
            street_number: Some("500".to_string()),
            floor: Some(" ".to_string()),
            apartment: None,
            city: Some("Córdoba".to_string()),
            province_code: Some("X".to_string()),
            postal_code: Some("X5000ABC".to_string()),
        }
    }

    fn request(delivery_type: &str) -> ShipmentImportRequest {
        ShipmentImportRequest {
            ext_order_id: "7d1f0c8e".to_string(),
            order_number: None,
            recipient_name: Some("Ana Pérez".to_string()),
            recipient_phone: None,
            recipient_email: Some("Ana@Example.com".to_string()),
            delivery_type: delivery_type.to_string(),
            address: None,
            agency_code: None,
            package: PackageInput::grams_cm(1500, 10, 20, 30),
            declared_value: Decimal::new(25_000, 0),
            product_type: None,
        }
    }

    #[test]
    fn test_home_delivery_requires_address() {
        let err = request("D").validate(sender()).unwrap_err();
        assert_eq!(
            err.validation_errors().unwrap(),
            ["address is required for home delivery (D)"]
        );
    }

    #[test]
    fn test_home_delivery_reports_each_missing_address_field() {
        let mut req = request("D");
        req.address = Some(AddressInput {
            street_number: None,
            city: Some("  ".to_string()),
            province_code: Some("O".to_string()),
            ..home_address()
        });
        let err = req.validate(sender()).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e == "address.streetNumber is required"));
        assert!(errors.iter().any(|e| e == "address.city is required"));
        assert!(errors.iter().any(|e| e.starts_with("address.provinceCode")));
    }

    #[test]
    fn test_home_delivery_valid() {
        let mut req = request("D");
        req.address = Some(home_address());
        let import = req.validate(sender()).unwrap();

        let Delivery::Home { address } = &import.delivery else {
            panic!("expected home delivery");
        };
        assert_eq!(address.postal_code.as_str(), "5000");
        assert_eq!(address.floor, None);
        assert_eq!(import.recipient.email.as_str(), "ana@example.com");
        assert_eq!(import.product_type, DEFAULT_PRODUCT_TYPE);
    }

    #[test]
    fn test_agency_pickup_requires_agency_code() {
        let mut req = request("S");
        req.agency_code = Some("   ".to_string());
        let err = req.validate(sender()).unwrap_err();
        assert_eq!(
            err.validation_errors().unwrap(),
            ["agencyCode is required for agency pickup (S)"]
        );
    }

    #[test]
    fn test_agency_pickup_ignores_address() {
        let mut req = request("S");
        req.agency_code = Some("X0012".to_string());
        req.address = Some(AddressInput::default());
        let import = req.validate(sender()).unwrap();
        assert_eq!(
            import.delivery,
            Delivery::Agency {
                agency_code: "X0012".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_delivery_type_rejected() {
        let err = request("X").validate(sender()).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.iter().any(|e| e.starts_with("deliveryType")));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut req = request("S");
        req.recipient_name = None;
        req.recipient_email = Some("not-an-email".to_string());
        req.package = PackageInput::grams_cm(30_000, 10, 10, 10);
        req.declared_value = Decimal::ZERO;
        let err = req.validate(sender()).unwrap_err();
        assert_eq!(err.validation_errors().unwrap().len(), 5);
    }

    #[test]
    fn test_wire_format_for_agency_pickup() {
        let mut req = request("S");
        req.agency_code = Some("X0012".to_string());
        let import = req.validate(sender()).unwrap();

        let body = serde_json::to_value(import.to_wire("0001234567")).unwrap();
        assert_eq!(body["customerId"], "0001234567");
        assert_eq!(body["orderNumber"], "7d1f0c8e");
        assert_eq!(body["sender"]["originAddress"]["provinceCode"], "C");
        assert_eq!(body["recipient"]["email"], "ana@example.com");
        assert_eq!(body["shipping"]["deliveryType"], "S");
        assert_eq!(body["shipping"]["agency"], "X0012");
        assert!(body["shipping"].get("address").is_none());
        assert_eq!(body["shipping"]["weight"], 1500);
        assert_eq!(body["shipping"]["declaredValue"], 25000.0);
    }
}

//! `MiCorreo` client against a fake carrier.
//!
//! Covers the token lifecycle (caching, refresh near expiry, dropping a
//! rejected token), quoting, the agency cache and shipment imports.

#![allow(clippy::indexing_slicing)]

use rust_decimal::Decimal;
use secrecy::SecretString;

use tienda_correo::{
    AgencyQuery, AgencyService, CorreoClient, CorreoError, DeliveryType, PackageInput,
    ProvinceCode, RateRequest, ShipmentImportRequest,
};
use tienda_correo::shipments::{AddressInput, Sender};
use tienda_integration_tests::{CUSTOMER_ID, FakeCorreo, VALID_PASSWORD};

fn rate_request(to: &str, delivery: Option<DeliveryType>) -> RateRequest {
    RateRequest::new(
        "1425",
        to,
        delivery,
        &PackageInput::grams_cm(1200, 10, 20, 30),
    )
    .expect("valid rate request")
}

fn sender() -> Sender {
    Sender {
        name: "Tienda SRL".to_string(),
        phone: Some("1145678900".to_string()),
        email: Some("envios@tienda.test".to_string()),
        origin_address: AddressInput {
            street_name: Some("Av. Santa Fe".to_string()),
            street_number: Some("3200".to_string()),
            floor: None,
            apartment: None,
            city: Some("CABA".to_string()),
            province_code: Some("C".to_string()),
            postal_code: Some("C1425BGN".to_string()),
        }
        .validate("sender", &mut Vec::new())
        .expect("valid sender address"),
    }
}

fn import_request() -> ShipmentImportRequest {
    ShipmentImportRequest {
        ext_order_id: "7d4c9a52-0d55-4c1c-9a0e-3e1f2b6a9c11".to_string(),
        order_number: Some("7D4C9A52".to_string()),
        recipient_name: Some("Ana Gómez".to_string()),
        recipient_phone: None,
        recipient_email: Some("ana@example.com".to_string()),
        delivery_type: "S".to_string(),
        address: None,
        agency_code: Some("X0001".to_string()),
        package: PackageInput::grams_cm(800, 8, 20, 30),
        declared_value: Decimal::new(2_500_000, 2),
        product_type: None,
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_token_is_cached_between_calls() {
    let correo = FakeCorreo::start().await;
    let client = CorreoClient::new(correo.client_config()).expect("client");

    client.rates(&rate_request("5000", None)).await.expect("first quote");
    client.rates(&rate_request("5001", None)).await.expect("second quote");

    assert_eq!(correo.token_requests(), 1);
    assert_eq!(correo.rate_requests(), 2);
    assert!(client.has_valid_token().await);
}

#[tokio::test]
async fn test_token_close_to_expiry_is_replaced() {
    let correo = FakeCorreo::start().await;
    // Inside the 60 second buffer: never considered valid
    correo.set_token_lifetime(30).await;
    let client = CorreoClient::new(correo.client_config()).expect("client");

    client.rates(&rate_request("5000", None)).await.expect("first quote");
    client.rates(&rate_request("5000", None)).await.expect("second quote");

    assert_eq!(correo.token_requests(), 2);
}

#[tokio::test]
async fn test_rejected_token_is_dropped_without_retry() {
    let correo = FakeCorreo::start().await;
    let client = CorreoClient::new(correo.client_config()).expect("client");

    client.access_token().await.expect("token");
    correo.reject_next_call();

    let result = client.rates(&rate_request("5000", None)).await;
    assert!(matches!(result, Err(CorreoError::TokenExpired)));
    assert!(client.get_token().await.is_none());
    assert_eq!(correo.rate_requests(), 0);

    // The next call authenticates again
    client.rates(&rate_request("5000", None)).await.expect("quote");
    assert_eq!(correo.token_requests(), 2);
}

#[tokio::test]
async fn test_validate_user() {
    let correo = FakeCorreo::start().await;
    let client = CorreoClient::new(correo.client_config()).expect("client");

    let customer_id = client
        .validate_user("tienda@example.com", &SecretString::from(VALID_PASSWORD))
        .await
        .expect("known user");
    assert_eq!(customer_id, CUSTOMER_ID);

    let result = client
        .validate_user("tienda@example.com", &SecretString::from("otra"))
        .await;
    assert!(matches!(result, Err(CorreoError::NotFound(message)) if message == "Usuario inexistente"));
}

// ============================================================================
// Rates
// ============================================================================

#[tokio::test]
async fn test_rates_wire_format_and_parsing() {
    let correo = FakeCorreo::start().await;
    let client = CorreoClient::new(correo.client_config()).expect("client");

    let quote = client
        .rates(&rate_request("x5000abc", Some(DeliveryType::Home)))
        .await
        .expect("quote");

    let body = correo.last_rate_body().await.expect("request recorded");
    assert_eq!(body["customerId"], CUSTOMER_ID);
    assert_eq!(body["postalCodeOrigin"], "1425");
    assert_eq!(body["postalCodeDestination"], "5000");
    assert_eq!(body["deliveredType"], "D");
    assert_eq!(body["dimensions"]["weight"], 1200);

    assert_eq!(quote.rates.len(), 2);
    let cheapest = quote.cheapest(Some(DeliveryType::Home)).expect("a home rate");
    assert_eq!(cheapest.price, Decimal::new(512_050, 2));
    assert_eq!(cheapest.delivery_time_min, Some(2));
    assert_eq!(cheapest.delivery_time_max, Some(5));
}

#[tokio::test]
async fn test_invalid_rate_request_never_reaches_carrier() {
    let result = RateRequest::new(
        "1425",
        "12",
        None,
        &PackageInput::grams_cm(30_000, 10, 20, 30),
    );

    let Err(CorreoError::Validation(errors)) = result else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.len(), 2, "{errors:?}");
}

// ============================================================================
// Agencies
// ============================================================================

#[tokio::test]
async fn test_agencies_are_cached_and_filtered() {
    let correo = FakeCorreo::start().await;
    let client = CorreoClient::new(correo.client_config()).expect("client");
    let cordoba: ProvinceCode = "X".parse().expect("province");

    let active = client
        .agencies(&AgencyQuery::pickup_in(cordoba))
        .await
        .expect("agencies");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].code, "X0001");

    let all = client
        .agencies(&AgencyQuery {
            province: cordoba,
            services: Some(AgencyService::PickupAvailability),
            include_inactive: true,
        })
        .await
        .expect("agencies");
    assert_eq!(all.len(), 2);

    // Same province and service filter: served from cache
    assert_eq!(correo.agency_requests(), 1);

    let other = client
        .agencies(&AgencyQuery::pickup_in("B".parse().expect("province")))
        .await
        .expect("agencies");
    assert_eq!(other[0].code, "B0001");
    assert_eq!(correo.agency_requests(), 2);
}

// ============================================================================
// Shipment import
// ============================================================================

#[tokio::test]
async fn test_import_agency_shipment() {
    let correo = FakeCorreo::start().await;
    let client = CorreoClient::new(correo.client_config()).expect("client");

    let shipment = import_request().validate(sender()).expect("valid import");
    let receipt = client.import_shipment(&shipment).await.expect("imported");

    assert_eq!(receipt.created_at.as_deref(), Some("2026-10-16T12:00:00-03:00"));
    let body = correo.last_import_body().await.expect("import recorded");
    assert_eq!(body["customerId"], CUSTOMER_ID);
    assert_eq!(body["extOrderId"], "7d4c9a52-0d55-4c1c-9a0e-3e1f2b6a9c11");
    assert_eq!(body["recipient"]["email"], "ana@example.com");
    assert_eq!(body["shipping"]["deliveryType"], "S");
    assert_eq!(body["shipping"]["agency"], "X0001");
    assert_eq!(body["shipping"]["productType"], "CP");
    assert!(body["shipping"].get("address").is_none());
}

#[tokio::test]
async fn test_invalid_import_lists_every_problem() {
    let mut request = import_request();
    request.recipient_email = Some("no-es-un-email".to_string());
    request.agency_code = None;
    request.declared_value = Decimal::ZERO;

    let Err(CorreoError::Validation(errors)) = request.validate(sender()) else {
        panic!("expected validation errors");
    };
    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(errors.iter().any(|e| e.starts_with("recipient.email")));
    assert!(errors.iter().any(|e| e.contains("agencyCode")));
    assert!(errors.iter().any(|e| e.contains("declaredValue")));
}

#[tokio::test]
async fn test_home_import_requires_address() {
    let mut request = import_request();
    request.delivery_type = "D".to_string();

    let Err(CorreoError::Validation(errors)) = request.validate(sender()) else {
        panic!("expected validation errors");
    };
    assert_eq!(errors, vec!["address is required for home delivery (D)".to_string()]);
}

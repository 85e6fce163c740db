//! Checkout through the real carrier and payment clients.
//!
//! The order store is in memory; `ShippingService` and
//! `MercadoPagoClient` talk HTTP to the fakes in this crate.

#![allow(clippy::indexing_slicing)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::types::Json;
use url::Url;

use tienda_core::{
    CartLine, Coupon, DeliveryMethod, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId, VariantId,
};
use tienda_correo::{AddressInput, CorreoClient, PostalCode};
use tienda_integration_tests::{FakeCorreo, FakeMercadoPago, ORIGIN_POSTAL_CODE};
use tienda_storefront::db::RepositoryError;
use tienda_storefront::models::{NewOrder, Order, VariantStock};
use tienda_storefront::services::checkout::{
    Checkout, CheckoutError, CheckoutRequest, CheckoutStore, CustomerInput,
};
use tienda_storefront::services::payments::MercadoPagoClient;
use tienda_storefront::services::shipping::ShippingService;

#[derive(Default)]
struct MemoryStore {
    variants: Vec<VariantStock>,
    orders: Mutex<Vec<Order>>,
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn variants(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<VariantStock>, RepositoryError> {
        Ok(self
            .variants
            .iter()
            .filter(|v| product_ids.contains(&v.product_id))
            .cloned()
            .collect())
    }

    async fn coupon_by_code(&self, _code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(None)
    }

    async fn create_order(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.lock().expect("store lock");
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(i64::try_from(orders.len()).expect("small") + 1),
            public_id: new.public_id,
            status: OrderStatus::Pending,
            customer_name: new.customer_name.clone(),
            customer_email: new.customer_email.clone(),
            customer_phone: new.customer_phone.clone(),
            delivery_method: new.delivery_method,
            shipping_address: new.shipping_address.clone().map(Json),
            agency_code: new.agency_code.clone(),
            destination_postal_code: new.destination_postal_code.clone(),
            shipping_service: new.shipping_service.clone(),
            payment_method: new.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            payment_preference_id: None,
            coupon_id: new.coupon_id,
            subtotal: new.totals.subtotal,
            discount: new.totals.discount,
            shipping_cost: new.totals.shipping,
            total: new.totals.total,
            created_at: now,
            updated_at: now,
        };
        orders.push(order.clone());
        Ok(order)
    }

    async fn attach_preference(
        &self,
        order_id: OrderId,
        preference_id: &str,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.lock().expect("store lock");
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = OrderStatus::PendingPayment;
        order.payment_preference_id = Some(preference_id.to_string());
        Ok(order.clone())
    }
}

fn store() -> MemoryStore {
    MemoryStore {
        variants: vec![VariantStock {
            variant_id: VariantId::new(1),
            product_id: ProductId::new(10),
            product_name: "Remera Lino".to_string(),
            price: Money::from_cents(1_000_000),
            size: Some("M".to_string()),
            color: Some("Crudo".to_string()),
            stock: 8,
            weight_grams: 250,
            height_cm: 3,
            width_cm: 25,
            length_cm: 30,
            active: true,
        }],
        orders: Mutex::default(),
    }
}

fn shipping(correo: &FakeCorreo) -> ShippingService {
    ShippingService::new(
        CorreoClient::new(correo.client_config()).expect("correo client"),
        PostalCode::parse(ORIGIN_POSTAL_CODE).expect("origin"),
        None,
    )
}

fn payments(mp: &FakeMercadoPago) -> MercadoPagoClient {
    MercadoPagoClient::new(
        &mp.config(None),
        &Url::parse("https://tienda.test").expect("storefront URL"),
    )
    .expect("mercado pago client")
}

fn request(delivery_method: DeliveryMethod, payment_method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        items: vec![CartLine {
            product_id: ProductId::new(10),
            quantity: 2,
            size: Some("M".to_string()),
            color: Some("crudo".to_string()),
        }],
        customer: CustomerInput {
            name: "Lucía Fernández".to_string(),
            email: "lucia@example.com".to_string(),
            phone: Some("3514567890".to_string()),
        },
        delivery_method,
        address: Some(AddressInput {
            street_name: Some("Bv. San Juan".to_string()),
            street_number: Some("450".to_string()),
            floor: Some("3".to_string()),
            apartment: Some("B".to_string()),
            city: Some("Córdoba".to_string()),
            province_code: Some("X".to_string()),
            postal_code: Some("X5000ABC".to_string()),
        }),
        agency_code: Some("X0001".to_string()),
        postal_code: Some("5000".to_string()),
        payment_method,
        coupon_code: None,
    }
}

#[tokio::test]
async fn test_home_delivery_with_mercado_pago() {
    let correo = FakeCorreo::start().await;
    let mp = FakeMercadoPago::start().await;
    let store = store();
    let shipping = shipping(&correo);
    let gateway = payments(&mp);
    let checkout = Checkout::new(&store, &shipping, Some(&gateway), None);

    let outcome = checkout
        .place_order(
            &request(DeliveryMethod::Home, PaymentMethod::MercadoPago),
            Utc::now(),
        )
        .await
        .expect("checkout");

    let order = &outcome.order;
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.subtotal, Money::from_cents(2_000_000));
    assert_eq!(order.shipping_cost, Money::new(Decimal::new(512_050, 2)));
    assert_eq!(order.total, Money::new(Decimal::new(2_512_050, 2)));
    assert_eq!(order.shipping_service.as_deref(), Some("CP"));
    assert_eq!(order.destination_postal_code.as_deref(), Some("5000"));
    assert_eq!(order.payment_preference_id.as_deref(), Some("123456-pref-1"));

    let url = outcome.payment_url.expect("payment URL");
    assert!(url.starts_with("https://www.mercadopago.com.ar/"), "{url}");

    let rate = correo.last_rate_body().await.expect("carrier quoted");
    assert_eq!(rate["postalCodeOrigin"], ORIGIN_POSTAL_CODE);
    assert_eq!(rate["postalCodeDestination"], "5000");
    assert_eq!(rate["deliveredType"], "D");
    assert_eq!(rate["dimensions"]["weight"], 500);

    let preferences = mp.preferences().await;
    assert_eq!(preferences.len(), 1);
    let preference = &preferences[0];
    assert_eq!(preference["external_reference"], order.public_id.to_string());
    assert_eq!(preference["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(preference["items"][0]["currency_id"], "ARS");
    assert_eq!(preference["items"][0]["unit_price"], 25120.5);
    assert_eq!(preference["payer"]["email"], "lucia@example.com");
    assert_eq!(
        preference["notification_url"],
        "https://tienda.test/api/payments/webhook"
    );
}

#[tokio::test]
async fn test_agency_pickup_quotes_agency_rates() {
    let correo = FakeCorreo::start().await;
    let store = store();
    let shipping = shipping(&correo);
    let checkout = Checkout::new(&store, &shipping, None, None);

    let outcome = checkout
        .place_order(
            &request(DeliveryMethod::Agency, PaymentMethod::BankTransfer),
            Utc::now(),
        )
        .await
        .expect("checkout");

    assert_eq!(outcome.order.status, OrderStatus::Pending);
    assert_eq!(outcome.order.agency_code.as_deref(), Some("X0001"));
    assert_eq!(outcome.order.shipping_cost, Money::from_cents(389_000));
    assert!(outcome.order.shipping_address.is_none());
    assert!(outcome.payment_url.is_none());

    let rate = correo.last_rate_body().await.expect("carrier quoted");
    assert_eq!(rate["deliveredType"], "S");
}

#[tokio::test]
async fn test_free_shipping_still_checks_destination() {
    let correo = FakeCorreo::start().await;
    let store = store();
    let shipping = shipping(&correo);
    let threshold = Some(Money::from_cents(1_500_000));
    let checkout = Checkout::new(&store, &shipping, None, threshold);

    let outcome = checkout
        .place_order(
            &request(DeliveryMethod::Home, PaymentMethod::BankTransfer),
            Utc::now(),
        )
        .await
        .expect("checkout");

    assert_eq!(outcome.order.shipping_cost, Money::ZERO);
    assert_eq!(outcome.order.total, Money::from_cents(2_000_000));
    assert_eq!(correo.rate_requests(), 1);
}

#[tokio::test]
async fn test_repeated_quotes_hit_the_cache() {
    let correo = FakeCorreo::start().await;
    let store = store();
    let shipping = shipping(&correo);
    let checkout = Checkout::new(&store, &shipping, None, None);
    let request = request(DeliveryMethod::Home, PaymentMethod::BankTransfer);

    checkout.place_order(&request, Utc::now()).await.expect("first");
    checkout.place_order(&request, Utc::now()).await.expect("second");

    assert_eq!(correo.rate_requests(), 1);
    assert_eq!(store.orders.lock().expect("store lock").len(), 2);
}

#[tokio::test]
async fn test_payment_provider_failure_keeps_order_pending() {
    let correo = FakeCorreo::start().await;
    let mp = FakeMercadoPago::start().await;
    mp.fail_preferences();
    let store = store();
    let shipping = shipping(&correo);
    let gateway = payments(&mp);
    let checkout = Checkout::new(&store, &shipping, Some(&gateway), None);

    let result = checkout
        .place_order(
            &request(DeliveryMethod::Home, PaymentMethod::MercadoPago),
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(CheckoutError::Payment(_))));
    let orders = store.orders.lock().expect("store lock");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert!(orders[0].payment_preference_id.is_none());
}

#[tokio::test]
async fn test_carrier_rejecting_destination_fails_before_persisting() {
    let correo = FakeCorreo::start().await;
    let store = store();
    let shipping = shipping(&correo);
    let checkout = Checkout::new(&store, &shipping, None, None);

    correo.reject_next_call();
    // Token request succeeds, the quote itself is refused
    let result = checkout
        .place_order(
            &request(DeliveryMethod::Home, PaymentMethod::BankTransfer),
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(CheckoutError::Shipping(_))));
    assert!(store.orders.lock().expect("store lock").is_empty());
}

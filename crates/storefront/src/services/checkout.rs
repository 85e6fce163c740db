//! Checkout sequencer.
//!
//! Turns a client-side cart into a persisted order:
//!
//! 1. Validate the request
//! 2. Load the variants and check stock
//! 3. Price every line from the catalog
//! 4. Apply the coupon, if any
//! 5. Quote shipping
//! 6. Compute totals
//! 7. Persist the order, taking stock and coupon usage
//! 8. Hand off to the payment provider when the method needs it
//!
//! Prices sent by the client are never read. Everything the sequencer
//! touches goes through [`CheckoutStore`], [`ShippingQuoter`] and
//! [`PaymentGateway`] so it can run against in-memory fakes.
//!
//! Nothing is rolled back after step 7: if the payment provider fails, the
//! order stays `PENDING` with its stock reserved and the error is logged.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use tienda_core::coupon::normalize_code;
use tienda_core::{
    CartLine, Coupon, CouponError, DeliveryMethod, Email, Money, OrderId, OrderTotals,
    PaymentMethod, ProductId, StockError, StockKey, StockShortage, VariantId, check_stock,
};
use tienda_correo::{Address, AddressInput, CorreoError, PostalCode};

use crate::db::{CouponRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::models::{NewOrder, NewOrderItem, Order, VariantStock};
use crate::services::payments::{PaymentError, PaymentGateway, PreferenceRequest};
use crate::services::shipping::{
    ParcelItem, ShippingQuoter, delivery_type_for, parcel_for, qualifies_for_free_shipping,
};

/// Largest quantity accepted on a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 99;

const MAX_NAME_LENGTH: usize = 100;

/// Errors from checkout and cart preview.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("shipping quote failed: {0}")]
    Shipping(#[from] CorreoError),

    #[error("no shipping rate available for this destination")]
    NoShippingRate,

    #[error("payment provider error: {0}")]
    Payment(#[from] PaymentError),

    #[error("online payment is not available; choose another payment method")]
    PaymentUnavailable,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Who is buying.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Checkout request as posted by the storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub customer: CustomerInput,
    pub delivery_method: DeliveryMethod,
    /// Required for home delivery.
    #[serde(default)]
    pub address: Option<AddressInput>,
    /// Required for agency pickup.
    #[serde(default)]
    pub agency_code: Option<String>,
    /// Destination for agency pickup quotes.
    #[serde(default)]
    pub postal_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    /// Hosted payment page, for methods that need one.
    pub payment_url: Option<String>,
}

/// A cart line priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// Stock and pricing preview of a cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartPreview {
    /// Whether every line can be bought as is.
    pub available: bool,
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub shortages: Vec<StockShortage>,
}

/// Data access checkout needs.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Variants of the given products, inactive products included.
    async fn variants(&self, product_ids: &[ProductId])
    -> Result<Vec<VariantStock>, RepositoryError>;

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;

    /// Persist the order, taking stock and coupon usage atomically.
    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Store the payment preference and move the order to `PENDING_PAYMENT`.
    async fn attach_preference(
        &self,
        order_id: OrderId,
        preference_id: &str,
    ) -> Result<Order, RepositoryError>;
}

/// `PostgreSQL` checkout store.
#[derive(Clone)]
pub struct PgCheckoutStore {
    pool: PgPool,
}

impl PgCheckoutStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckoutStore for PgCheckoutStore {
    async fn variants(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<VariantStock>, RepositoryError> {
        ProductRepository::new(&self.pool)
            .variant_stock(product_ids)
            .await
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        CouponRepository::new(&self.pool).find_by_code(code).await
    }

    async fn create_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool).create(order).await
    }

    async fn attach_preference(
        &self,
        order_id: OrderId,
        preference_id: &str,
    ) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool)
            .set_payment_preference(order_id, preference_id)
            .await
    }
}

/// Where the parcel goes, once validated.
#[derive(Debug, Clone)]
struct Destination {
    postal_code: Option<PostalCode>,
    address: Option<Address>,
    agency_code: Option<String>,
}

/// The checkout sequencer.
pub struct Checkout<'a> {
    store: &'a dyn CheckoutStore,
    shipping: &'a dyn ShippingQuoter,
    payments: Option<&'a dyn PaymentGateway>,
    free_shipping_threshold: Option<Money>,
}

impl<'a> Checkout<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn CheckoutStore,
        shipping: &'a dyn ShippingQuoter,
        payments: Option<&'a dyn PaymentGateway>,
        free_shipping_threshold: Option<Money>,
    ) -> Self {
        Self {
            store,
            shipping,
            payments,
            free_shipping_threshold,
        }
    }

    /// Run the whole checkout.
    ///
    /// # Errors
    ///
    /// Returns the first `CheckoutError` hit. Errors before the order is
    /// persisted leave nothing behind.
    #[instrument(
        skip(self, request),
        fields(
            lines = request.items.len(),
            delivery = ?request.delivery_method,
            payment = ?request.payment_method,
        )
    )]
    pub async fn place_order(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        // 1. Validate
        let (email, destination) = self.validate(request)?;

        // 2-3. Stock and pricing
        let (lines, variants) = self.load_and_price(&request.items).await?;
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();

        // 4. Coupon
        let (coupon_id, discount) = match non_blank(request.coupon_code.as_deref()) {
            Some(code) => {
                let (coupon, discount) = self.apply_coupon(code, subtotal, now).await?;
                (Some(coupon.id), discount)
            }
            None => (None, Money::ZERO),
        };

        // 5. Shipping
        let (shipping, shipping_service) = self
            .quote_shipping(
                request.delivery_method,
                &destination,
                &lines,
                &variants,
                subtotal.saturating_sub(discount),
            )
            .await?;

        // 6. Totals
        let totals = OrderTotals::compute(subtotal, discount, shipping);

        // 7. Persist
        let new_order = NewOrder {
            public_id: Uuid::new_v4(),
            customer_name: request.customer.name.trim().to_string(),
            customer_email: email,
            customer_phone: non_blank(request.customer.phone.as_deref()).map(str::to_string),
            delivery_method: request.delivery_method,
            shipping_address: destination.address,
            agency_code: destination.agency_code,
            destination_postal_code: destination.postal_code.map(|p| p.as_str().to_string()),
            shipping_service,
            payment_method: request.payment_method,
            coupon_id,
            totals,
            items: lines.iter().map(to_order_item).collect(),
        };
        let order = self.store.create_order(&new_order).await?;

        // 8. Payment hand-off
        if !request.payment_method.requires_redirect() {
            return Ok(CheckoutOutcome {
                order,
                payment_url: None,
            });
        }
        let gateway = self.payments.ok_or(CheckoutError::PaymentUnavailable)?;

        let preference = gateway
            .create_preference(&PreferenceRequest {
                order_public_id: order.public_id,
                title: format!("Pedido {}", order.reference()),
                total: order.total,
                payer_name: order.customer_name.clone(),
                payer_email: order.customer_email.as_str().to_string(),
            })
            .await
            .inspect_err(|e| {
                error!(
                    order_id = %order.id,
                    error = %e,
                    "Payment preference failed; order left PENDING"
                );
            })?;

        let order = self
            .store
            .attach_preference(order.id, &preference.id)
            .await
            .inspect_err(|e| {
                error!(order_id = %order.id, error = %e, "Failed to store payment preference");
            })?;

        info!(order_id = %order.id, preference_id = %preference.id, "Checkout handed off to payment");

        Ok(CheckoutOutcome {
            order,
            payment_url: Some(preference.checkout_url),
        })
    }

    /// Stock and pricing for a cart without placing an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for empty carts or bad quantities.
    pub async fn preview(&self, items: &[CartLine]) -> Result<CartPreview, CheckoutError> {
        let errors = line_errors(items);
        if !errors.is_empty() {
            return Err(CheckoutError::Validation(errors));
        }

        let variants = self.load_variants(items).await?;
        let shortages = match check_stock(items, &availability(&variants)) {
            Ok(()) => Vec::new(),
            Err(StockError::Insufficient(shortages)) => shortages,
            Err(other) => return Err(other.into()),
        };

        let lines = price_lines(items, &variants);
        let subtotal = lines.iter().map(|l| l.line_total).sum();

        Ok(CartPreview {
            available: shortages.is_empty(),
            lines,
            subtotal,
            shortages,
        })
    }

    fn validate(&self, request: &CheckoutRequest) -> Result<(Email, Destination), CheckoutError> {
        let mut errors = line_errors(&request.items);

        let name = request.customer.name.trim();
        if name.is_empty() {
            errors.push("customer.name is required".to_string());
        } else if name.chars().count() > MAX_NAME_LENGTH {
            errors.push(format!(
                "customer.name must be at most {MAX_NAME_LENGTH} characters"
            ));
        }
        let email = Email::parse(&request.customer.email)
            .map_err(|e| errors.push(format!("customer.email: {e}")))
            .ok();

        let destination = match request.delivery_method {
            DeliveryMethod::Home => match &request.address {
                Some(input) => input.validate("address", &mut errors).map(|address| Destination {
                    postal_code: Some(address.postal_code.clone()),
                    address: Some(address),
                    agency_code: None,
                }),
                None => {
                    errors.push("address is required for home delivery".to_string());
                    None
                }
            },
            DeliveryMethod::Agency => {
                let agency_code = non_blank(request.agency_code.as_deref());
                if agency_code.is_none() {
                    errors.push("agency_code is required for agency pickup".to_string());
                }
                let postal_code = match non_blank(request.postal_code.as_deref()) {
                    Some(code) => PostalCode::parse(code)
                        .map_err(|e| errors.push(format!("postal_code: {e}")))
                        .ok(),
                    None => {
                        errors.push("postal_code is required for agency pickup".to_string());
                        None
                    }
                };
                match (agency_code, postal_code) {
                    (Some(agency_code), Some(postal_code)) => Some(Destination {
                        postal_code: Some(postal_code),
                        address: None,
                        agency_code: Some(agency_code.to_string()),
                    }),
                    _ => None,
                }
            }
            DeliveryMethod::StorePickup => Some(Destination {
                postal_code: None,
                address: None,
                agency_code: None,
            }),
        };

        if request.payment_method == PaymentMethod::CashOnPickup
            && request.delivery_method != DeliveryMethod::StorePickup
        {
            errors.push("cash_on_pickup is only available with store_pickup".to_string());
        }

        match (email, destination) {
            (Some(email), Some(destination)) if errors.is_empty() => {
                if request.payment_method.requires_redirect() && self.payments.is_none() {
                    return Err(CheckoutError::PaymentUnavailable);
                }
                Ok((email, destination))
            }
            _ => Err(CheckoutError::Validation(errors)),
        }
    }

    async fn load_variants(&self, items: &[CartLine]) -> Result<Vec<VariantStock>, CheckoutError> {
        let mut product_ids: Vec<ProductId> = items.iter().map(|l| l.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let variants = self.store.variants(&product_ids).await?;
        Ok(variants.into_iter().filter(|v| v.active).collect())
    }

    async fn load_and_price(
        &self,
        items: &[CartLine],
    ) -> Result<(Vec<PricedLine>, Vec<VariantStock>), CheckoutError> {
        let variants = self.load_variants(items).await?;
        check_stock(items, &availability(&variants))?;
        let lines = price_lines(items, &variants);
        Ok((lines, variants))
    }

    async fn apply_coupon(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<(Coupon, Money), CheckoutError> {
        let coupon = self
            .store
            .coupon_by_code(&normalize_code(code))
            .await?
            .ok_or(CouponError::NotFound)?;
        coupon.validate(subtotal, now)?;
        let discount = coupon.discount_for(subtotal);
        Ok((coupon, discount))
    }

    async fn quote_shipping(
        &self,
        method: DeliveryMethod,
        destination: &Destination,
        lines: &[PricedLine],
        variants: &[VariantStock],
        discounted_subtotal: Money,
    ) -> Result<(Money, Option<String>), CheckoutError> {
        let (Some(delivery), Some(postal_code)) =
            (delivery_type_for(method), destination.postal_code.as_ref())
        else {
            return Ok((Money::ZERO, None));
        };

        let parcel: Vec<ParcelItem> = lines
            .iter()
            .filter_map(|line| {
                let variant = variants.iter().find(|v| v.variant_id == line.variant_id)?;
                Some(ParcelItem::from_variant(variant, line.quantity))
            })
            .collect();

        let rate = self
            .shipping
            .cheapest_rate(postal_code.as_str(), delivery, &parcel_for(&parcel))
            .await?
            .ok_or(CheckoutError::NoShippingRate)?;

        let cost = if qualifies_for_free_shipping(discounted_subtotal, self.free_shipping_threshold)
        {
            Money::ZERO
        } else {
            Money::new(rate.price)
        };
        Ok((cost, Some(rate.product_type)))
    }
}

fn line_errors(items: &[CartLine]) -> Vec<String> {
    let mut errors = Vec::new();
    if items.is_empty() {
        errors.push("items must not be empty".to_string());
    }
    for (i, line) in items.iter().enumerate() {
        if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
            errors.push(format!(
                "items[{i}].quantity must be between 1 and {MAX_LINE_QUANTITY}"
            ));
        }
    }
    errors
}

fn availability(variants: &[VariantStock]) -> HashMap<StockKey, u32> {
    variants
        .iter()
        .map(|v| (v.key(), v.stock.max(0).unsigned_abs()))
        .collect()
}

/// Price cart lines from the catalog, merging lines for the same variant.
/// Lines without a matching variant are left out.
fn price_lines(items: &[CartLine], variants: &[VariantStock]) -> Vec<PricedLine> {
    let by_key: HashMap<StockKey, &VariantStock> = variants.iter().map(|v| (v.key(), v)).collect();

    let mut quantities: BTreeMap<StockKey, u32> = BTreeMap::new();
    for line in items {
        let entry = quantities.entry(line.key()).or_insert(0);
        *entry = entry.saturating_add(line.quantity);
    }

    quantities
        .into_iter()
        .filter_map(|(key, quantity)| {
            let variant = by_key.get(&key)?;
            Some(PricedLine {
                product_id: variant.product_id,
                variant_id: variant.variant_id,
                product_name: variant.product_name.clone(),
                size: variant.size.clone(),
                color: variant.color.clone(),
                unit_price: variant.price,
                quantity,
                line_total: variant.price * quantity,
            })
        })
        .collect()
}

fn to_order_item(line: &PricedLine) -> NewOrderItem {
    NewOrderItem {
        product_id: line.product_id,
        variant_id: line.variant_id,
        product_name: line.product_name.clone(),
        size: line.size.clone(),
        color: line.color.clone(),
        unit_price: line.unit_price,
        quantity: line.quantity,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

//! Shipping: carrier quotes, agency lookup and shipment imports.
//!
//! A cart ships as a single parcel. Its measurements come from the catalog:
//! weights are added up, items are stacked (heights add up) and the parcel
//! is as long and as wide as the largest item.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use tienda_core::{DeliveryMethod, Money, OrderId, OrderStatus};
use tienda_correo::shipments::DEFAULT_PRODUCT_TYPE;
use tienda_correo::{
    Agency, AgencyQuery, AgencyService, AddressInput, CorreoClient, CorreoError, DeliveryType,
    ImportReceipt, Package, PackageInput, PostalCode, ProvinceCode, Rate, RateQuote, RateRequest,
    Sender, ShipmentImport, ShipmentImportRequest,
};

use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::models::{NewShipment, Order, OrderItem, Shipment, VariantStock};

const QUOTE_CACHE_TTL: Duration = Duration::from_secs(600);
const QUOTE_CACHE_CAPACITY: u64 = 10_000;

/// Errors from the shipping service.
#[derive(Debug, Error)]
pub enum ShippingError {
    #[error(transparent)]
    Correo(#[from] CorreoError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The order cannot be shipped in its current state.
    #[error("{0}")]
    NotShippable(String),

    #[error("sender address is not configured (set CORREO_SENDER_*)")]
    SenderNotConfigured,
}

/// Measurements of one catalog item, repeated `quantity` times in the parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParcelItem {
    pub weight_grams: u32,
    pub height_cm: u32,
    pub width_cm: u32,
    pub length_cm: u32,
    pub quantity: u32,
}

impl ParcelItem {
    /// Measurements of a catalog variant. Non-positive values count as zero
    /// and are caught by the carrier bounds check.
    #[must_use]
    pub fn from_variant(variant: &VariantStock, quantity: u32) -> Self {
        Self {
            weight_grams: variant.weight_grams.max(0).unsigned_abs(),
            height_cm: variant.height_cm.max(0).unsigned_abs(),
            width_cm: variant.width_cm.max(0).unsigned_abs(),
            length_cm: variant.length_cm.max(0).unsigned_abs(),
            quantity,
        }
    }
}

/// Combine items into one parcel.
#[must_use]
pub fn parcel_for(items: &[ParcelItem]) -> PackageInput {
    let (weight, height, width, length) =
        items
            .iter()
            .fold((0_u32, 0_u32, 0_u32, 0_u32), |(w, h, wi, l), item| {
                (
                    w.saturating_add(item.weight_grams.saturating_mul(item.quantity)),
                    h.saturating_add(item.height_cm.saturating_mul(item.quantity)),
                    wi.max(item.width_cm),
                    l.max(item.length_cm),
                )
            });
    PackageInput::grams_cm(weight, height, width, length)
}

/// Shipping is free once the discounted subtotal reaches the threshold.
#[must_use]
pub fn qualifies_for_free_shipping(discounted_subtotal: Money, threshold: Option<Money>) -> bool {
    threshold.is_some_and(|threshold| discounted_subtotal >= threshold)
}

/// The carrier delivery type an order's delivery method maps to.
#[must_use]
pub const fn delivery_type_for(method: DeliveryMethod) -> Option<DeliveryType> {
    match method {
        DeliveryMethod::Home => Some(DeliveryType::Home),
        DeliveryMethod::Agency => Some(DeliveryType::Agency),
        DeliveryMethod::StorePickup => None,
    }
}

/// Quotes the carrier during checkout.
#[async_trait]
pub trait ShippingQuoter: Send + Sync {
    /// Cheapest rate of the given delivery type to `destination`, or `None`
    /// if the carrier offers none.
    async fn cheapest_rate(
        &self,
        destination: &str,
        delivery: DeliveryType,
        package: &PackageInput,
    ) -> Result<Option<Rate>, CorreoError>;
}

/// Rate quote as sent by API callers; the origin defaults to the store's.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuoteInput {
    #[serde(default)]
    pub postal_code_origin: Option<String>,
    pub postal_code_destination: String,
    #[serde(default)]
    pub delivered_type: Option<DeliveryType>,
    pub dimensions: PackageInput,
}

type QuoteKey = (PostalCode, PostalCode, Option<DeliveryType>, Package);

/// Shipping service backed by Correo Argentino.
///
/// Cheap to clone; clones share the quote cache.
#[derive(Clone)]
pub struct ShippingService {
    correo: CorreoClient,
    origin: PostalCode,
    sender: Option<Sender>,
    quotes: Cache<QuoteKey, Arc<RateQuote>>,
}

impl ShippingService {
    #[must_use]
    pub fn new(correo: CorreoClient, origin: PostalCode, sender: Option<Sender>) -> Self {
        let quotes = Cache::builder()
            .max_capacity(QUOTE_CACHE_CAPACITY)
            .time_to_live(QUOTE_CACHE_TTL)
            .build();

        Self {
            correo,
            origin,
            sender,
            quotes,
        }
    }

    #[must_use]
    pub const fn correo(&self) -> &CorreoClient {
        &self.correo
    }

    /// Quote every service the carrier offers for a parcel.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError::Validation` for bad postal codes or
    /// measurements, and other `CorreoError`s from the carrier.
    pub async fn quote(&self, input: &RateQuoteInput) -> Result<RateQuote, CorreoError> {
        let origin = input
            .postal_code_origin
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| self.origin.as_str());
        let request = RateRequest::new(
            origin,
            &input.postal_code_destination,
            input.delivered_type,
            &input.dimensions,
        )?;
        Ok(self.quote_request(&request).await?.as_ref().clone())
    }

    #[instrument(skip(self, request), fields(destination = %request.postal_code_destination))]
    async fn quote_request(&self, request: &RateRequest) -> Result<Arc<RateQuote>, CorreoError> {
        let key = (
            request.postal_code_origin.clone(),
            request.postal_code_destination.clone(),
            request.delivered_type,
            request.dimensions,
        );
        if let Some(cached) = self.quotes.get(&key).await {
            debug!("Rate quote cache hit");
            return Ok(cached);
        }

        let quote = Arc::new(self.correo.rates(request).await?);
        self.quotes.insert(key, Arc::clone(&quote)).await;
        Ok(quote)
    }

    /// Active agencies in a province.
    ///
    /// # Errors
    ///
    /// Returns `CorreoError` from the carrier.
    pub async fn agencies(
        &self,
        province: ProvinceCode,
        services: Option<AgencyService>,
    ) -> Result<Vec<Agency>, CorreoError> {
        let query = AgencyQuery {
            province,
            services,
            include_inactive: false,
        };
        self.correo.agencies(&query).await
    }

    /// Validate and send an import on behalf of the configured sender.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::SenderNotConfigured` without a sender,
    /// `CorreoError::Validation` for invalid requests and other
    /// `CorreoError`s from the carrier.
    pub async fn import(
        &self,
        request: &ShipmentImportRequest,
    ) -> Result<(ShipmentImport, ImportReceipt), ShippingError> {
        let shipment = self.prepare(request)?;
        let receipt = self.correo.import_shipment(&shipment).await?;
        Ok((shipment, receipt))
    }

    fn prepare(&self, request: &ShipmentImportRequest) -> Result<ShipmentImport, ShippingError> {
        let sender = self
            .sender
            .clone()
            .ok_or(ShippingError::SenderNotConfigured)?;
        Ok(request.validate(sender)?)
    }

    /// Import an order's parcel and record the shipment.
    ///
    /// Only paid (`PROCESSED`) carrier orders without a shipment qualify.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::NotShippable` for orders in the wrong state,
    /// `RepositoryError::NotFound` for unknown orders,
    /// `RepositoryError::Conflict` when the order already has a shipment
    /// (or another import is in flight), and carrier errors as they come.
    /// A failed carrier call releases the claim.
    #[instrument(skip(self, pool))]
    pub async fn import_order(
        &self,
        pool: &PgPool,
        order_id: OrderId,
    ) -> Result<Shipment, ShippingError> {
        let orders = OrderRepository::new(pool);
        let order = orders.get(order_id).await?.ok_or(RepositoryError::NotFound)?;

        if order.status != OrderStatus::Processed {
            return Err(ShippingError::NotShippable(format!(
                "order is {}; only {} orders can be shipped",
                order.status,
                OrderStatus::Processed
            )));
        }

        let items = orders.items(order.id).await?;
        let product_ids: Vec<_> = items.iter().map(|i| i.product_id).collect();
        let variants = ProductRepository::new(pool).variant_stock(&product_ids).await?;

        let request = import_request_for(&order, &items, &variants)?;
        let shipment = self.prepare(&request)?;

        // Claimed before the carrier call: a concurrent import stops here
        let claim = orders
            .claim_shipment(&NewShipment {
                order_id: order.id,
                delivery_type: shipment.delivery.delivery_type().code().to_string(),
                agency_code: request.agency_code.clone(),
                weight_grams: to_i32(shipment.package.weight),
                height_cm: to_i32(shipment.package.height),
                width_cm: to_i32(shipment.package.width),
                length_cm: to_i32(shipment.package.length),
                declared_value: Money::new(shipment.declared_value),
            })
            .await?;

        let receipt = match self.correo.import_shipment(&shipment).await {
            Ok(receipt) => receipt,
            Err(err) => {
                if let Err(release_err) = orders.release_shipment(claim.id).await {
                    error!(
                        shipment_id = %claim.id,
                        error = %release_err,
                        "Failed to release shipment claim"
                    );
                }
                return Err(err.into());
            }
        };

        let recorded = orders
            .complete_shipment(claim.id, receipt.created_at.as_deref())
            .await?;

        info!(order_id = %order.id, shipment_id = %recorded.id, "Shipment imported");
        Ok(recorded)
    }
}

#[async_trait]
impl ShippingQuoter for ShippingService {
    async fn cheapest_rate(
        &self,
        destination: &str,
        delivery: DeliveryType,
        package: &PackageInput,
    ) -> Result<Option<Rate>, CorreoError> {
        let request = RateRequest::new(self.origin.as_str(), destination, Some(delivery), package)?;
        let quote = self.quote_request(&request).await?;
        Ok(quote.cheapest(Some(delivery)).cloned())
    }
}

/// Build the carrier import for an order from its lines and the catalog.
///
/// # Errors
///
/// Returns `ShippingError::NotShippable` for store pickup orders.
pub fn import_request_for(
    order: &Order,
    items: &[OrderItem],
    variants: &[VariantStock],
) -> Result<ShipmentImportRequest, ShippingError> {
    let delivery = delivery_type_for(order.delivery_method).ok_or_else(|| {
        ShippingError::NotShippable("store pickup orders are not shipped".to_string())
    })?;

    let parcel: Vec<ParcelItem> = items
        .iter()
        .filter_map(|item| {
            let variant = variants.iter().find(|v| v.variant_id == item.variant_id)?;
            Some(ParcelItem::from_variant(
                variant,
                item.quantity.max(0).unsigned_abs(),
            ))
        })
        .collect();

    Ok(ShipmentImportRequest {
        ext_order_id: order.public_id.to_string(),
        order_number: Some(order.reference()),
        recipient_name: Some(order.customer_name.clone()),
        recipient_phone: order.customer_phone.clone(),
        recipient_email: Some(order.customer_email.as_str().to_string()),
        delivery_type: delivery.code().to_string(),
        address: order
            .shipping_address
            .as_ref()
            .map(|address| AddressInput::from(&address.0)),
        agency_code: order.agency_code.clone(),
        package: parcel_for(&parcel),
        declared_value: order.subtotal.amount(),
        product_type: Some(
            order
                .shipping_service
                .clone()
                .unwrap_or_else(|| DEFAULT_PRODUCT_TYPE.to_string()),
        ),
    })
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

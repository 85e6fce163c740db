//! Order, order item and shipment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use tienda_core::{
    CouponId, DeliveryMethod, Email, Money, OrderId, OrderStatus, OrderTotals, PaymentMethod,
    PaymentStatus, ProductId, ShipmentId, VariantId,
};
use tienda_correo::Address;

/// A placed order.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub public_id: Uuid,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<Json<Address>>,
    pub agency_code: Option<String>,
    pub destination_postal_code: Option<String>,
    pub shipping_service: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub payment_preference_id: Option<String>,
    pub coupon_id: Option<CouponId>,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub const fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            discount: self.discount,
            shipping: self.shipping_cost,
            total: self.total,
        }
    }

    /// Short reference shown to customers and printed on labels.
    #[must_use]
    pub fn reference(&self) -> String {
        let simple = self.public_id.simple().to_string();
        simple.chars().take(8).collect::<String>().to_uppercase()
    }
}

/// A purchased line, priced at checkout time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// An order with its lines and shipment, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub shipment: Option<Shipment>,
}

/// Order to insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub public_id: Uuid,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub shipping_address: Option<Address>,
    pub agency_code: Option<String>,
    pub destination_postal_code: Option<String>,
    pub shipping_service: Option<String>,
    pub payment_method: PaymentMethod,
    pub coupon_id: Option<CouponId>,
    pub totals: OrderTotals,
    pub items: Vec<NewOrderItem>,
}

/// Line to insert; decrements the variant's stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

impl NewOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A shipment registered with the carrier.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub delivery_type: String,
    pub agency_code: Option<String>,
    pub weight_grams: i32,
    pub height_cm: i32,
    pub width_cm: i32,
    pub length_cm: i32,
    pub declared_value: Money,
    pub carrier_created_at: Option<String>,
    /// `None` while the carrier import is in flight.
    pub imported_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Shipment to claim before calling the carrier.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub order_id: OrderId,
    pub delivery_type: String,
    pub agency_code: Option<String>,
    pub weight_grams: i32,
    pub height_cm: i32,
    pub width_cm: i32,
    pub length_cm: i32,
    pub declared_value: Money,
}

/// Admin order listing parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Largest page the admin API returns.
pub const MAX_PAGE_SIZE: i64 = 100;

const fn default_limit() -> i64 {
    25
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl OrderFilter {
    /// Clamp paging to sane bounds.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            status: self.status,
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.max(0),
        }
    }
}

/// A page of orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

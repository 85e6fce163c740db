//! Domain models for the storefront database.

pub mod analytics;
pub mod order;
pub mod product;

pub use analytics::{AnalyticsSummary, LowStockVariant, StatusCount, TopProduct};
pub use order::{
    NewOrder, NewOrderItem, NewShipment, Order, OrderDetail, OrderFilter, OrderItem, OrderPage,
    Shipment,
};
pub use product::{
    NewProduct, NewVariant, Product, ProductFilter, ProductUpdate, ProductWithVariants, Variant,
    VariantStock,
};

//! Business logic for the storefront.
//!
//! # Services
//!
//! - `checkout` - Cart validation, pricing and order placement
//! - `orders` - Status advances and payment notifications
//! - `payments` - Mercado Pago hosted checkout
//! - `shipping` - Correo Argentino quotes, agencies and shipment import

pub mod checkout;
pub mod orders;
pub mod payments;
pub mod shipping;

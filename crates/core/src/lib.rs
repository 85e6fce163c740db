//! Tienda Core - domain types and checkout rules.
//!
//! This crate is shared by every Tienda component:
//! - `tienda-correo` - Correo Argentino carrier client
//! - `tienda-storefront` - JSON API for the storefront and the admin back-office
//! - `tienda-cli` - Migrations, seeding and carrier diagnostics
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here can be unit tested without a
//! runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails and status enums
//! - [`cart`] - Cart lines and the stock-sufficiency check
//! - [`coupon`] - Coupon eligibility rules and discount math
//! - [`totals`] - Order total arithmetic

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod coupon;
pub mod totals;
pub mod types;

pub use cart::{CartLine, StockError, StockKey, StockShortage, check_stock};
pub use coupon::{Coupon, CouponError};
pub use totals::OrderTotals;
pub use types::*;

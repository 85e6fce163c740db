//! Cart lines and the stock-sufficiency check.
//!
//! The cart itself lives on the client; the server only sees it at checkout
//! (and in the cart preview endpoint). A line names a product plus the size
//! and color the customer picked, and the check runs against the variant
//! stock loaded for exactly those keys.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A line in the customer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CartLine {
    /// The variant this line refers to.
    #[must_use]
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size.as_deref(), self.color.as_deref())
    }
}

/// Identifies a sellable variant: product, size and color.
///
/// Size and color are compared case-insensitively and blank values are the
/// same as no value, so `"M"`, `" m "` and `"m"` hit the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl StockKey {
    /// Build a normalized key.
    #[must_use]
    pub fn new(product_id: ProductId, size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            product_id,
            size: normalize_attribute(size),
            color: normalize_attribute(color),
        }
    }
}

fn normalize_attribute(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

/// A variant that cannot cover the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortage {
    pub key: StockKey,
    pub requested: u32,
    /// Zero when the variant does not exist.
    pub available: u32,
}

/// Why a cart failed the stock check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("quantity must be at least 1 for product {}", .0.product_id)]
    ZeroQuantity(StockKey),
    #[error("insufficient stock for {} item(s)", .0.len())]
    Insufficient(Vec<StockShortage>),
}

/// Check every cart line against available stock.
///
/// Lines for the same variant are added up before comparing, so two lines of
/// 3 against a stock of 5 fail. Every shortage is reported, not just the
/// first one.
///
/// # Errors
///
/// Returns [`StockError`] when the cart is empty, a line has quantity zero, or
/// any variant is unknown or short.
pub fn check_stock(
    lines: &[CartLine],
    available: &HashMap<StockKey, u32>,
) -> Result<(), StockError> {
    if lines.is_empty() {
        return Err(StockError::EmptyCart);
    }

    let mut requested: BTreeMap<StockKey, u32> = BTreeMap::new();
    for line in lines {
        let key = line.key();
        if line.quantity == 0 {
            return Err(StockError::ZeroQuantity(key));
        }
        let entry = requested.entry(key).or_insert(0);
        *entry = entry.saturating_add(line.quantity);
    }

    let shortages: Vec<StockShortage> = requested
        .into_iter()
        .filter_map(|(key, quantity)| {
            let in_stock = available.get(&key).copied().unwrap_or(0);
            (quantity > in_stock).then_some(StockShortage {
                key,
                requested: quantity,
                available: in_stock,
            })
        })
        .collect();

    if shortages.is_empty() {
        Ok(())
    } else {
        Err(StockError::Insufficient(shortages))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn line(product: i64, quantity: u32, size: &str) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            quantity,
            size: Some(size.to_string()),
            color: Some("Negro".to_string()),
        }
    }

    fn stock(entries: &[(i64, &str, u32)]) -> HashMap<StockKey, u32> {
        entries
            .iter()
            .map(|(product, size, qty)| {
                (
                    StockKey::new(ProductId::new(*product), Some(size), Some("negro")),
                    *qty,
                )
            })
            .collect()
    }

    #[test]
    fn test_sufficient_stock_passes() {
        let available = stock(&[(1, "M", 5), (2, "L", 1)]);
        assert!(check_stock(&[line(1, 5, "M"), line(2, 1, "L")], &available).is_ok());
    }

    #[test]
    fn test_any_line_over_stock_rejects() {
        let available = stock(&[(1, "M", 5), (2, "L", 1)]);
        let err = check_stock(&[line(1, 2, "M"), line(2, 3, "L")], &available).unwrap_err();
        let StockError::Insufficient(shortages) = err else {
            panic!("expected shortage");
        };
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].requested, 3);
        assert_eq!(shortages[0].available, 1);
    }

    #[test]
    fn test_duplicate_lines_are_summed() {
        let available = stock(&[(1, "M", 5)]);
        assert!(check_stock(&[line(1, 3, "M"), line(1, 3, " m ")], &available).is_err());
    }

    #[test]
    fn test_unknown_variant_is_a_shortage() {
        let available = stock(&[(1, "M", 5)]);
        let err = check_stock(&[line(1, 1, "XL")], &available).unwrap_err();
        assert!(matches!(err, StockError::Insufficient(ref s) if s[0].available == 0));
    }

    #[test]
    fn test_empty_and_zero_quantity() {
        let available = stock(&[(1, "M", 5)]);
        assert_eq!(check_stock(&[], &available), Err(StockError::EmptyCart));
        assert!(matches!(
            check_stock(&[line(1, 0, "M")], &available),
            Err(StockError::ZeroQuantity(_))
        ));
    }
}

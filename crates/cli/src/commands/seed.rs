//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - slug: remera-basica
//!     name: Remera básica
//!     price: "12999.00"
//!     weight_grams: 250
//!     height_cm: 3
//!     width_cm: 25
//!     length_cm: 30
//!     variants:
//!       - { size: M, color: negro, sku: REM-M-NEG, stock: 10 }
//! ```
//!
//! Products are matched by slug and variants by SKU, so the file can be
//! applied repeatedly. The whole file is validated before connecting.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use tienda_storefront::db::ProductRepository;
use tienda_storefront::models::NewProduct;

use super::{CommandError, connect};

/// A catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<NewProduct>,
}

/// Every problem with a catalog, prefixed with the product it belongs to.
#[must_use]
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut slugs = HashSet::new();
    let mut skus = HashSet::new();

    for (i, product) in catalog.products.iter().enumerate() {
        let label = format!("products[{i}] ({})", product.slug);

        if !slugs.insert(product.slug.as_str()) {
            errors.push(format!("{label}: duplicate slug"));
        }
        errors.extend(product.validate().into_iter().map(|e| format!("{label}: {e}")));

        for (j, variant) in product.variants.iter().enumerate() {
            match variant.sku.as_deref().map(str::trim) {
                None | Some("") => {
                    errors.push(format!(
                        "{label}: variants[{j}] needs a sku to be seeded"
                    ));
                }
                Some(sku) => {
                    if !skus.insert(sku.to_string()) {
                        errors.push(format!("{label}: duplicate sku {sku}"));
                    }
                }
            }
        }
    }

    errors
}

/// Parse and validate a catalog file's contents.
///
/// # Errors
///
/// Returns `CommandError::Yaml` for malformed YAML and
/// `CommandError::Validation` listing every problem found.
pub fn parse_catalog(content: &str) -> Result<CatalogFile, CommandError> {
    let catalog: CatalogFile = serde_yaml::from_str(content)?;
    let errors = validate_catalog(&catalog);
    if errors.is_empty() {
        Ok(catalog)
    } else {
        Err(CommandError::Validation(errors))
    }
}

/// Upsert every product in the file.
///
/// # Errors
///
/// Returns an error if the file is invalid or a database operation fails.
pub async fn catalog(file_path: &Path) -> Result<(), CommandError> {
    info!(path = %file_path.display(), "Loading catalog");

    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.display().to_string(),
            source,
        })?;
    let catalog = parse_catalog(&content)?;
    info!(products = catalog.products.len(), "Catalog validated");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let mut failed = 0_usize;
    for product in &catalog.products {
        match repo.upsert_by_slug(product).await {
            Ok(id) => info!(slug = %product.slug, product_id = %id, "Seeded"),
            Err(e) => {
                failed += 1;
                error!(slug = %product.slug, error = %e, "Failed to seed product");
            }
        }
    }

    info!(
        seeded = catalog.products.len() - failed,
        failed, "Seeding complete"
    );
    if failed > 0 {
        return Err(CommandError::Invalid(format!(
            "{failed} product(s) failed to seed"
        )));
    }
    Ok(())
}

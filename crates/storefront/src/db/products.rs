//! Product repository.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database.

use std::collections::HashMap;

use sqlx::PgPool;

use tienda_core::{ProductId, VariantId};

use super::RepositoryError;
use crate::models::{
    NewProduct, NewVariant, Product, ProductFilter, ProductUpdate, ProductWithVariants, Variant,
    VariantStock,
};

const PRODUCT_COLUMNS: &str = "id, slug, name, description, category, price, image_url, \
     weight_grams, height_cm, width_cm, length_cm, active, created_at, updated_at";

/// Repository for catalog operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products with their variants, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductWithVariants>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE ($1 OR active) AND ($2::TEXT IS NULL OR category = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let products: Vec<Product> = sqlx::query_as(&sql)
            .bind(filter.include_inactive)
            .bind(filter.category.as_deref())
            .fetch_all(self.pool)
            .await?;

        self.attach_variants(products).await
    }

    /// Get one product with its variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: ProductId,
        include_inactive: bool,
    ) -> Result<Option<ProductWithVariants>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND ($2 OR active)");
        let product: Option<Product> = sqlx::query_as(&sql)
            .bind(id)
            .bind(include_inactive)
            .fetch_optional(self.pool)
            .await?;

        match product {
            Some(product) => Ok(self.attach_variants(vec![product]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Create a product and its variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug or a SKU is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewProduct) -> Result<ProductWithVariants, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO products (slug, name, description, category, price, image_url, \
             weight_grams, height_cm, width_cm, length_cm) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let product: Product = sqlx::query_as(&sql)
            .bind(&new.slug)
            .bind(new.name.trim())
            .bind(&new.description)
            .bind(new.category.as_deref())
            .bind(new.price)
            .bind(new.image_url.as_deref())
            .bind(new.weight_grams)
            .bind(new.height_cm)
            .bind(new.width_cm)
            .bind(new.length_cm)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "slug already exists"))?;

        let mut variants = Vec::with_capacity(new.variants.len());
        for variant in &new.variants {
            let inserted: Variant = sqlx::query_as(
                r"
                INSERT INTO product_variants (product_id, size, color, sku, stock)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, product_id, size, color, sku, stock
                ",
            )
            .bind(product.id)
            .bind(trimmed(variant.size.as_deref()))
            .bind(trimmed(variant.color.as_deref()))
            .bind(trimmed(variant.sku.as_deref()))
            .bind(variant.stock)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "duplicate variant or SKU"))?;
            variants.push(inserted);
        }

        tx.commit().await?;

        Ok(ProductWithVariants { product, variants })
    }

    /// Insert or update a product by slug, and its variants by SKU.
    ///
    /// Used by catalog seeding; variants without a SKU are rejected.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a variant has no SKU or clashes
    /// with another variant. Returns `RepositoryError::Database` for other
    /// database errors.
    pub async fn upsert_by_slug(&self, new: &NewProduct) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products (slug, name, description, category, price, image_url,
                                  weight_grams, height_cm, width_cm, length_cm)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                category = EXCLUDED.category,
                price = EXCLUDED.price,
                image_url = EXCLUDED.image_url,
                weight_grams = EXCLUDED.weight_grams,
                height_cm = EXCLUDED.height_cm,
                width_cm = EXCLUDED.width_cm,
                length_cm = EXCLUDED.length_cm,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&new.slug)
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.category.as_deref())
        .bind(new.price)
        .bind(new.image_url.as_deref())
        .bind(new.weight_grams)
        .bind(new.height_cm)
        .bind(new.width_cm)
        .bind(new.length_cm)
        .fetch_one(&mut *tx)
        .await?;

        for variant in &new.variants {
            upsert_variant(&mut tx, id, variant).await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<ProductWithVariants, RepositoryError> {
        let sql = format!(
            "UPDATE products SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 category = COALESCE($4, category), \
                 price = COALESCE($5, price), \
                 image_url = COALESCE($6, image_url), \
                 weight_grams = COALESCE($7, weight_grams), \
                 height_cm = COALESCE($8, height_cm), \
                 width_cm = COALESCE($9, width_cm), \
                 length_cm = COALESCE($10, length_cm), \
                 active = COALESCE($11, active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let product: Option<Product> = sqlx::query_as(&sql)
            .bind(id)
            .bind(update.name.as_deref().map(str::trim))
            .bind(update.description.as_deref())
            .bind(update.category.as_deref())
            .bind(update.price)
            .bind(update.image_url.as_deref())
            .bind(update.weight_grams)
            .bind(update.height_cm)
            .bind(update.width_cm)
            .bind(update.length_cm)
            .bind(update.active)
            .fetch_optional(self.pool)
            .await?;

        let product = product.ok_or(RepositoryError::NotFound)?;
        self.attach_variants(vec![product])
            .await?
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound)
    }

    /// Hide a product from the storefront. Orders keep referencing it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE products SET active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set a variant's stock to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not belong to
    /// the product.
    pub async fn set_variant_stock(
        &self,
        product_id: ProductId,
        variant_id: VariantId,
        stock: i32,
    ) -> Result<Variant, RepositoryError> {
        sqlx::query_as(
            r"
            UPDATE product_variants
            SET stock = $3, updated_at = NOW()
            WHERE id = $2 AND product_id = $1
            RETURNING id, product_id, size, color, sku, stock
            ",
        )
        .bind(product_id)
        .bind(variant_id)
        .bind(stock)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Variants of the given products, joined with the product fields
    /// checkout prices and ships from.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_stock(
        &self,
        product_ids: &[ProductId],
    ) -> Result<Vec<VariantStock>, RepositoryError> {
        let ids: Vec<i64> = product_ids.iter().map(ProductId::as_i64).collect();
        let rows = sqlx::query_as(
            r"
            SELECT v.id AS variant_id, v.product_id, p.name AS product_name, p.price,
                   v.size, v.color, v.stock,
                   p.weight_grams, p.height_cm, p.width_cm, p.length_cm, p.active
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.product_id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn attach_variants(
        &self,
        products: Vec<Product>,
    ) -> Result<Vec<ProductWithVariants>, RepositoryError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = products.iter().map(|p| p.id.as_i64()).collect();
        let variants: Vec<Variant> = sqlx::query_as(
            r"
            SELECT id, product_id, size, color, sku, stock
            FROM product_variants
            WHERE product_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_product: HashMap<ProductId, Vec<Variant>> = HashMap::new();
        for variant in variants {
            by_product.entry(variant.product_id).or_default().push(variant);
        }

        Ok(products
            .into_iter()
            .map(|product| {
                let variants = by_product.remove(&product.id).unwrap_or_default();
                ProductWithVariants { product, variants }
            })
            .collect())
    }
}

async fn upsert_variant(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: ProductId,
    variant: &NewVariant,
) -> Result<(), RepositoryError> {
    let sku = trimmed(variant.sku.as_deref())
        .ok_or_else(|| RepositoryError::Conflict("seeded variants need a SKU".to_string()))?;

    sqlx::query(
        r"
        INSERT INTO product_variants (product_id, size, color, sku, stock)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (sku) DO UPDATE SET
            size = EXCLUDED.size,
            color = EXCLUDED.color,
            stock = EXCLUDED.stock,
            updated_at = NOW()
        WHERE product_variants.product_id = EXCLUDED.product_id
        ",
    )
    .bind(product_id)
    .bind(trimmed(variant.size.as_deref()))
    .bind(trimmed(variant.color.as_deref()))
    .bind(sku)
    .bind(variant.stock)
    .execute(&mut **tx)
    .await
    .map_err(|e| RepositoryError::from_unique(e, "duplicate variant or SKU"))?;

    Ok(())
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

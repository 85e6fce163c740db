//! Order repository.
//!
//! Order creation is the only place stock and coupon usage change during
//! checkout. Both use conditional updates inside the order transaction, so
//! two customers racing for the last unit cannot both succeed.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use tienda_core::{CouponId, OrderId, OrderStatus, PaymentStatus, ShipmentId};

use super::RepositoryError;
use crate::models::{
    NewOrder, NewOrderItem, NewShipment, Order, OrderDetail, OrderFilter, OrderItem, OrderPage,
    Shipment,
};

const ORDER_COLUMNS: &str = "id, public_id, status, customer_name, customer_email, \
     customer_phone, delivery_method, shipping_address, agency_code, destination_postal_code, \
     shipping_service, payment_method, payment_status, payment_reference, payment_preference_id, \
     coupon_id, subtotal, discount, shipping_cost, total, created_at, updated_at";

const SHIPMENT_COLUMNS: &str = "id, order_id, delivery_type, agency_code, weight_grams, \
     height_cm, width_cm, length_cm, declared_value, carrier_created_at, imported_at, created_at";

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order as `PENDING`, taking stock and coupon usage with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a variant no longer has enough
    /// stock or the coupon was used up in the meantime. Nothing is written in
    /// that case. Returns `RepositoryError::Database` for other failures.
    pub async fn create(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in &new.items {
            reserve_stock(&mut tx, item).await?;
        }
        if let Some(coupon_id) = new.coupon_id {
            use_coupon(&mut tx, coupon_id).await?;
        }

        let sql = format!(
            "INSERT INTO orders (public_id, customer_name, customer_email, customer_phone, \
                 delivery_method, shipping_address, agency_code, destination_postal_code, \
                 shipping_service, payment_method, coupon_id, subtotal, discount, \
                 shipping_cost, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {ORDER_COLUMNS}"
        );
        let order: Order = sqlx::query_as(&sql)
            .bind(new.public_id)
            .bind(&new.customer_name)
            .bind(&new.customer_email)
            .bind(new.customer_phone.as_deref())
            .bind(new.delivery_method)
            .bind(new.shipping_address.as_ref().map(Json))
            .bind(new.agency_code.as_deref())
            .bind(new.destination_postal_code.as_deref())
            .bind(new.shipping_service.as_deref())
            .bind(new.payment_method)
            .bind(new.coupon_id)
            .bind(new.totals.subtotal)
            .bind(new.totals.discount)
            .bind(new.totals.shipping)
            .bind(new.totals.total)
            .fetch_one(&mut *tx)
            .await?;

        for item in &new.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, variant_id, product_name,
                                         size, color, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.product_name)
            .bind(item.size.as_deref())
            .bind(item.color.as_deref())
            .bind(item.unit_price)
            .bind(quantity(item)?)
            .bind(item.line_total())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            public_id = %order.public_id,
            total = %order.total,
            "Order created"
        );

        Ok(order)
    }

    /// Get an order by its internal id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Get an order by the id customers and the payment provider see.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_public_id(&self, public_id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE public_id = $1");
        let order = sqlx::query_as(&sql)
            .bind(public_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Lines of an order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as(
            r"
            SELECT id, order_id, product_id, variant_id, product_name, size, color,
                   unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Order with its lines and shipment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let items = self.items(order.id).await?;
        let shipment = self.shipment(order.id).await?;
        Ok(OrderDetail {
            order,
            items,
            shipment,
        })
    }

    /// A page of orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: OrderFilter) -> Result<OrderPage, RepositoryError> {
        let filter = filter.normalized();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::order_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        let orders = sqlx::query_as(&sql)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(self.pool)
            .await?;

        Ok(OrderPage {
            orders,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// Move an order from `from` to `to`, only if it is still in `from`.
    ///
    /// The caller checks that the transition is legal; this makes it stick
    /// even when another request changed the order in between.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer in
    /// `from`, and `RepositoryError::NotFound` if it does not exist.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE orders SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated: Option<Order> = sqlx::query_as(&sql)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(self.pool)
            .await?;

        match updated {
            Some(order) => Ok(order),
            None => Err(self.missing_or_conflict(id, from).await?),
        }
    }

    /// Store the payment preference and move the order to `PENDING_PAYMENT`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already left
    /// `PENDING`, and `RepositoryError::NotFound` if it does not exist.
    pub async fn set_payment_preference(
        &self,
        id: OrderId,
        preference_id: &str,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE orders SET payment_preference_id = $2, status = 'PENDING_PAYMENT', \
                 updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING' \
             RETURNING {ORDER_COLUMNS}"
        );
        let updated: Option<Order> = sqlx::query_as(&sql)
            .bind(id)
            .bind(preference_id)
            .fetch_optional(self.pool)
            .await?;

        match updated {
            Some(order) => Ok(order),
            None => Err(self.missing_or_conflict(id, OrderStatus::Pending).await?),
        }
    }

    /// Record what the payment provider reported for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn record_payment(
        &self,
        id: OrderId,
        reference: &str,
        status: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE orders SET payment_reference = $2, payment_status = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(id)
            .bind(reference)
            .bind(status)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Claim the order's single shipment before the carrier is called.
    /// Only one claim per order succeeds (`UNIQUE (order_id)`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has a
    /// shipment, imported or in flight.
    pub async fn claim_shipment(&self, new: &NewShipment) -> Result<Shipment, RepositoryError> {
        let sql = format!(
            "INSERT INTO shipments (order_id, delivery_type, agency_code, weight_grams, \
                 height_cm, width_cm, length_cm, declared_value) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SHIPMENT_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(new.order_id)
            .bind(&new.delivery_type)
            .bind(new.agency_code.as_deref())
            .bind(new.weight_grams)
            .bind(new.height_cm)
            .bind(new.width_cm)
            .bind(new.length_cm)
            .bind(new.declared_value)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "order already has a shipment"))
    }

    /// Mark a claimed shipment as accepted by the carrier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the claim no longer exists or
    /// was already completed.
    pub async fn complete_shipment(
        &self,
        id: ShipmentId,
        carrier_created_at: Option<&str>,
    ) -> Result<Shipment, RepositoryError> {
        let sql = format!(
            "UPDATE shipments SET imported_at = NOW(), carrier_created_at = $2 \
             WHERE id = $1 AND imported_at IS NULL \
             RETURNING {SHIPMENT_COLUMNS}"
        );
        sqlx::query_as(&sql)
            .bind(id)
            .bind(carrier_created_at)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Drop a claim the carrier never accepted, so the order can be
    /// imported again.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn release_shipment(&self, id: ShipmentId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shipments WHERE id = $1 AND imported_at IS NULL")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// The shipment recorded for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn shipment(&self, order_id: OrderId) -> Result<Option<Shipment>, RepositoryError> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE order_id = $1");
        let shipment = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(shipment)
    }

    async fn missing_or_conflict(
        &self,
        id: OrderId,
        expected: OrderStatus,
    ) -> Result<RepositoryError, RepositoryError> {
        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(match current {
            Some(status) => RepositoryError::Conflict(format!(
                "order {id} is {status}, expected {expected}"
            )),
            None => RepositoryError::NotFound,
        })
    }
}

async fn reserve_stock(
    tx: &mut Transaction<'_, Postgres>,
    item: &NewOrderItem,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE product_variants
        SET stock = stock - $1, updated_at = NOW()
        WHERE id = $2 AND stock >= $1
        ",
    )
    .bind(quantity(item)?)
    .bind(item.variant_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "not enough stock left for {}",
            item.product_name
        )));
    }
    Ok(())
}

async fn use_coupon(
    tx: &mut Transaction<'_, Postgres>,
    coupon_id: CouponId,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE coupons
        SET used_count = used_count + 1
        WHERE id = $1
          AND active
          AND (expires_at IS NULL OR expires_at > NOW())
          AND (max_uses IS NULL OR used_count < max_uses)
        ",
    )
    .bind(coupon_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(
            "coupon is no longer available".to_string(),
        ));
    }
    Ok(())
}

fn quantity(item: &NewOrderItem) -> Result<i32, RepositoryError> {
    i32::try_from(item.quantity).map_err(|_| {
        RepositoryError::DataCorruption(format!("quantity {} out of range", item.quantity))
    })
}

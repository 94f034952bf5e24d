use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use domain::{Delivery, Item, Order, Payment};

use crate::StoreError;

/// Durable, transactional storage of order aggregates.
///
/// An aggregate is persisted across four tables (root, delivery, payment,
/// items) and is only ever visible as a whole: `save` is atomic, and `load`
/// surfaces a missing child record as an integrity violation instead of
/// defaulting it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the aggregate atomically. Re-saving an existing `order_uid`
    /// replaces the root and all child rows inside the same transaction, so
    /// no orphaned child rows survive.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// Reconstruct the full aggregate for `order_uid`. Returns
    /// `StoreError::NotFound` when the root record is absent and
    /// `StoreError::Integrity` when the root exists but a required child
    /// record does not.
    async fn load(&self, order_uid: &str) -> Result<Order, StoreError>;

    /// Number of persisted order roots.
    async fn count(&self) -> Result<i64, StoreError>;

    /// Up to `limit` order identifiers in insertion order; 0 means all.
    async fn list_uids(&self, limit: usize) -> Result<Vec<String>, StoreError>;
}

/// PostgreSQL implementation of `OrderRepository`.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the order tables when they do not exist yet. Initial table
    /// creation only; there is no migration machinery beyond this.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deliveries (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                zip TEXT NOT NULL,
                city TEXT NOT NULL,
                address TEXT NOT NULL,
                region TEXT NOT NULL,
                email TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id BIGSERIAL PRIMARY KEY,
                order_uid TEXT NOT NULL UNIQUE,
                transaction TEXT NOT NULL,
                request_id TEXT NOT NULL DEFAULT '',
                currency TEXT NOT NULL,
                provider TEXT NOT NULL,
                amount BIGINT NOT NULL,
                payment_dt BIGINT NOT NULL,
                bank TEXT NOT NULL,
                delivery_cost BIGINT NOT NULL,
                goods_total BIGINT NOT NULL,
                custom_fee BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                order_uid TEXT PRIMARY KEY,
                track_number TEXT NOT NULL,
                entry TEXT NOT NULL,
                locale TEXT NOT NULL,
                internal_signature TEXT NOT NULL DEFAULT '',
                customer_id TEXT NOT NULL,
                delivery_service TEXT NOT NULL,
                shardkey TEXT NOT NULL,
                sm_id INTEGER NOT NULL,
                date_created TIMESTAMPTZ NOT NULL,
                oof_shard TEXT NOT NULL,
                delivery_id BIGINT NOT NULL REFERENCES deliveries (id),
                payment_id BIGINT NOT NULL REFERENCES payments (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_items (
                id BIGSERIAL PRIMARY KEY,
                order_uid TEXT NOT NULL,
                chrt_id BIGINT NOT NULL,
                track_number TEXT NOT NULL,
                price BIGINT NOT NULL,
                rid TEXT NOT NULL,
                name TEXT NOT NULL,
                sale INTEGER NOT NULL,
                size TEXT NOT NULL,
                total_price BIGINT NOT NULL,
                nm_id BIGINT NOT NULL,
                brand TEXT NOT NULL,
                status INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_order_items_order_uid ON order_items (order_uid)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // A re-save replaces the whole aggregate; prior child rows go away
        // inside the same transaction.
        let old_delivery_id: Option<i64> =
            sqlx::query_scalar("SELECT delivery_id FROM orders WHERE order_uid = $1")
                .bind(&order.order_uid)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(delivery_id) = old_delivery_id {
            debug!("replacing existing order {}", order.order_uid);

            sqlx::query("DELETE FROM order_items WHERE order_uid = $1")
                .bind(&order.order_uid)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM orders WHERE order_uid = $1")
                .bind(&order.order_uid)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM payments WHERE order_uid = $1")
                .bind(&order.order_uid)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM deliveries WHERE id = $1")
                .bind(delivery_id)
                .execute(&mut *tx)
                .await?;
        }

        let delivery_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO deliveries (name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&order.delivery.name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.zip)
        .bind(&order.delivery.city)
        .bind(&order.delivery.address)
        .bind(&order.delivery.region)
        .bind(&order.delivery.email)
        .fetch_one(&mut *tx)
        .await?;

        let payment_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO payments (
                order_uid, transaction, request_id, currency, provider,
                amount, payment_dt, bank, delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.payment.transaction)
        .bind(&order.payment.request_id)
        .bind(&order.payment.currency)
        .bind(&order.payment.provider)
        .bind(order.payment.amount)
        .bind(order.payment.payment_dt)
        .bind(&order.payment.bank)
        .bind(order.payment.delivery_cost)
        .bind(order.payment.goods_total)
        .bind(order.payment.custom_fee)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created,
                oof_shard, delivery_id, payment_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .bind(delivery_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_uid, chrt_id, track_number, price, rid, name,
                    sale, size, total_price, nm_id, brand, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            "order {} persisted with {} items",
            order.order_uid,
            order.items.len()
        );
        Ok(())
    }

    async fn load(&self, order_uid: &str) -> Result<Order, StoreError> {
        let root: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT order_uid, track_number, entry, locale, internal_signature,
                   customer_id, delivery_service, shardkey, sm_id, date_created,
                   oof_shard, delivery_id
            FROM orders
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?;

        let root = root.ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;

        let delivery: Option<DeliveryRow> = sqlx::query_as(
            "SELECT name, phone, zip, city, address, region, email FROM deliveries WHERE id = $1",
        )
        .bind(root.delivery_id)
        .fetch_optional(&self.pool)
        .await?;

        let delivery = delivery.ok_or_else(|| StoreError::Integrity {
            order_uid: order_uid.to_string(),
            missing: "delivery",
        })?;

        let payment: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT transaction, request_id, currency, provider, amount,
                   payment_dt, bank, delivery_cost, goods_total, custom_fee
            FROM payments
            WHERE order_uid = $1
            "#,
        )
        .bind(order_uid)
        .fetch_optional(&self.pool)
        .await?;

        let payment = payment.ok_or_else(|| StoreError::Integrity {
            order_uid: order_uid.to_string(),
            missing: "payment",
        })?;

        let items: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT chrt_id, track_number, price, rid, name, sale, size,
                   total_price, nm_id, brand, status
            FROM order_items
            WHERE order_uid = $1
            ORDER BY id
            "#,
        )
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await?;

        if items.is_empty() {
            return Err(StoreError::Integrity {
                order_uid: order_uid.to_string(),
                missing: "items",
            });
        }

        Ok(Order {
            order_uid: root.order_uid,
            track_number: root.track_number,
            entry: root.entry,
            delivery: delivery.into(),
            payment: payment.into(),
            items: items.into_iter().map(Into::into).collect(),
            locale: root.locale,
            internal_signature: root.internal_signature,
            customer_id: root.customer_id,
            delivery_service: root.delivery_service,
            shardkey: root.shardkey,
            sm_id: root.sm_id,
            date_created: root.date_created,
            oof_shard: root.oof_shard,
        })
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn list_uids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let uids: Vec<String> = if limit == 0 {
            sqlx::query_scalar("SELECT order_uid FROM orders ORDER BY date_created, order_uid")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_scalar(
                "SELECT order_uid FROM orders ORDER BY date_created, order_uid LIMIT $1",
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(uids)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
    delivery_id: i64,
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

impl From<DeliveryRow> for Delivery {
    fn from(row: DeliveryRow) -> Self {
        Delivery {
            name: row.name,
            phone: row.phone,
            zip: row.zip,
            city: row.city,
            address: row.address,
            region: row.region,
            email: row.email,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    transaction: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            transaction: row.transaction,
            request_id: row.request_id,
            currency: row.currency,
            provider: row.provider,
            amount: row.amount,
            payment_dt: row.payment_dt,
            bank: row.bank,
            delivery_cost: row.delivery_cost,
            goods_total: row.goods_total,
            custom_fee: row.custom_fee,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i32,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            chrt_id: row.chrt_id,
            track_number: row.track_number,
            price: row.price,
            rid: row.rid,
            name: row.name,
            sale: row.sale,
            size: row.size,
            total_price: row.total_price,
            nm_id: row.nm_id,
            brand: row.brand,
            status: row.status,
        }
    }
}

use async_trait::async_trait;
use common::{CartId, OrderId, ProductId, UserId};
use domain::{
    Aggregate, Cart, CartItem, Money, Order, OrderDraft, OrderEvent, OrderNumber, Product, Version,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EventEnvelope, EventId, Result, StoreError,
    store::{CommerceStore, MAX_STOCK, restock_lines, stock_param},
};

/// PostgreSQL-backed store implementation.
///
/// Stock changes are single conditional `UPDATE`s, so concurrent
/// reservations on the same product serialize on its row lock.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let stock: i32 = row.try_get("stock")?;
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: stock.max(0) as u32,
            weight_kg: row.try_get("weight_kg")?,
            is_active: row.try_get("is_active")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let data: serde_json::Value = row.try_get("data")?;
        let mut order: Order = serde_json::from_value(data)?;
        order.set_version(Version::new(row.try_get("version")?));
        Ok(order)
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
        })
    }

    /// Conditionally decrements stock inside `tx`.
    async fn reserve_in(
        tx: &mut Transaction<'_, Postgres>,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32> {
        let amount = stock_param(product_id, quantity)?;
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $1, updated_at = NOW()
            WHERE id = $2 AND stock >= $1
            RETURNING stock
            "#,
        )
        .bind(amount)
        .bind(product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(stock) = remaining {
            return Ok(stock as u32);
        }

        let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        match available {
            Some(available) => {
                metrics::counter!("stock_reservations_rejected_total").increment(1);
                Err(StoreError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: available as u32,
                })
            }
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    /// Increments stock inside `tx`, returning `None` if the product is gone.
    async fn restore_in(
        tx: &mut Transaction<'_, Postgres>,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Option<u32>> {
        let amount = stock_param(product_id, quantity)?;
        let stock: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $1, updated_at = NOW()
            WHERE id = $2 AND stock <= $3 - $1
            RETURNING stock
            "#,
        )
        .bind(amount)
        .bind(product_id.as_uuid())
        .bind(MAX_STOCK as i32)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(stock) = stock {
            return Ok(Some(stock as u32));
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;

        match exists {
            Some(_) => Err(StoreError::QuantityOutOfRange {
                product_id,
                quantity,
            }),
            None => Ok(None),
        }
    }

    /// Locks the user's cart and checks it still matches the draft.
    ///
    /// `save_cart` upserts the same `carts` row, so a concurrent cart write
    /// waits until this transaction ends.
    async fn verify_cart_in(
        tx: &mut Transaction<'_, Postgres>,
        draft: &OrderDraft,
    ) -> Result<()> {
        let cart_id: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
                .bind(draft.user_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;
        let Some(cart_id) = cart_id else {
            return Ok(());
        };

        let product_ids: Vec<Uuid> = draft
            .items
            .iter()
            .map(|item| item.product_id.as_uuid())
            .collect();
        let lines: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 AND product_id = ANY($2)",
        )
        .bind(cart_id)
        .bind(product_ids)
        .fetch_all(&mut **tx)
        .await?;

        for (product_id, quantity) in lines {
            let product_id = ProductId::from_uuid(product_id);
            let changed = draft.items.iter().any(|item| {
                item.product_id == product_id && i64::from(item.quantity) != i64::from(quantity)
            });
            if changed {
                return Err(StoreError::CartChanged { product_id });
            }
        }
        Ok(())
    }

    async fn insert_events(
        tx: &mut Transaction<'_, Postgres>,
        envelopes: &[EventEnvelope],
    ) -> Result<()> {
        for event in envelopes {
            sqlx::query(
                r#"
                INSERT INTO order_events (id, order_id, version, event_type, payload, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(event.order_id.as_uuid())
            .bind(event.version.as_i64())
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.timestamp)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, price_cents, stock, weight_kg, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                sku = EXCLUDED.sku,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                weight_kg = EXCLUDED.weight_kg,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price.cents())
        .bind(stock_param(product.id, product.stock)?)
        .bind(product.weight_kg)
        .bind(product.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, sku, price_cents, stock, weight_kg, is_active FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let uuids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(
            "SELECT id, name, sku, price_cents, stock, weight_kg, is_active FROM products WHERE id = ANY($1)",
        )
        .bind(uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn reserve_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let mut tx = self.pool.begin().await?;
        let stock = Self::reserve_in(&mut tx, product_id, quantity).await?;
        tx.commit().await?;
        Ok(stock)
    }

    #[tracing::instrument(skip(self))]
    async fn restore_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let mut tx = self.pool.begin().await?;
        let stock = Self::restore_in(&mut tx, product_id, quantity)
            .await?
            .ok_or(StoreError::ProductNotFound(product_id))?;
        tx.commit().await?;
        Ok(stock)
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let cart_row = sqlx::query("SELECT id, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(cart_row) = cart_row else {
            return Ok(Cart::new(user_id));
        };
        let cart_id = CartId::from_uuid(cart_row.try_get::<Uuid, _>("id")?);

        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price_cents, added_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY added_at ASC
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                let quantity: i32 = row.try_get("quantity")?;
                Ok(CartItem {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: quantity as u32,
                    unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                    added_at: row.try_get("added_at")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Cart {
            id: cart_id,
            user_id,
            items,
            updated_at: cart_row.try_get("updated_at")?,
        })
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let cart_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO carts (id, user_id, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(cart.user_id.as_uuid())
        .bind(cart.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        for item in &cart.items {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, product_id, quantity, unit_price_cents, added_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(cart_id)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.added_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, draft), fields(user_id = %draft.user_id, lines = draft.items.len()))]
    async fn place_order(&self, draft: OrderDraft) -> Result<Order> {
        if draft.items.is_empty() {
            return Err(domain::OrderError::EmptyCart.into());
        }

        let mut tx = self.pool.begin().await?;
        Self::verify_cart_in(&mut tx, &draft).await?;

        // Lock rows in a fixed order so concurrent checkouts cannot deadlock.
        let mut lines: Vec<_> = draft
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();
        lines.sort_by_key(|(product_id, _)| *product_id);
        for (product_id, quantity) in &lines {
            Self::reserve_in(&mut tx, *product_id, *quantity).await?;
        }

        let day = draft.placed_at.date_naive();
        let sequence: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO order_number_sequences (day, last_value)
            VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET last_value = order_number_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(day)
        .fetch_one(&mut *tx)
        .await?;

        let user_id = draft.user_id;
        let order_id = OrderId::new();
        let (order, placed) = Order::place(order_id, draft, OrderNumber::new(day, sequence as u32))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, status, payment_status,
                subtotal_cents, shipping_cost_cents, total_amount_cents,
                version, data, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(order.order_number().as_str())
        .bind(user_id.as_uuid())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.subtotal().cents())
        .bind(order.shipping_cost().cents())
        .bind(order.total_amount().cents())
        .bind(order.version().as_i64())
        .bind(serde_json::to_value(&order)?)
        .bind(order.created_at())
        .execute(&mut *tx)
        .await?;

        for item in order.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, product_name, product_sku,
                    quantity, unit_price_cents, line_total_cents
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(&item.product_sku)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.line_total().cents())
            .execute(&mut *tx)
            .await?;
        }

        let envelope = EventEnvelope::new(order_id, Version::first(), &placed)?;
        Self::insert_events(&mut tx, std::slice::from_ref(&envelope)).await?;

        let ordered: Vec<Uuid> = lines.iter().map(|(id, _)| id.as_uuid()).collect();
        sqlx::query(
            r#"
            DELETE FROM cart_items
            WHERE cart_id = (SELECT id FROM carts WHERE user_id = $1)
              AND product_id = ANY($2)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(ordered)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT data, version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT data, version FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT data, version FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, order_number DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    #[tracing::instrument(skip(self, order, events), fields(order_id = %order.id(), expected = %expected))]
    async fn save_order(
        &self,
        order: &Order,
        events: &[OrderEvent],
        expected: Version,
    ) -> Result<Version> {
        let order_id = order.id();
        let new_version = expected.advance(events.len());
        let mut stored = order.clone();
        stored.set_version(new_version);

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, version = $3, data = $4, updated_at = $5
            WHERE id = $6 AND version = $7
            "#,
        )
        .bind(stored.status().as_str())
        .bind(stored.payment_status().as_str())
        .bind(new_version.as_i64())
        .bind(serde_json::to_value(&stored)?)
        .bind(stored.updated_at())
        .bind(order_id.as_uuid())
        .bind(expected.as_i64())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
            return match actual {
                Some(actual) => {
                    metrics::counter!("order_version_conflicts_total").increment(1);
                    Err(StoreError::ConcurrencyConflict {
                        order_id,
                        expected,
                        actual: Version::new(actual),
                    })
                }
                None => Err(StoreError::OrderNotFound(order_id)),
            };
        }

        for line in restock_lines(events) {
            if Self::restore_in(&mut tx, line.product_id, line.quantity)
                .await?
                .is_none()
            {
                tracing::warn!(product_id = %line.product_id, "restock skipped for missing product");
            }
        }

        let envelopes = EventEnvelope::sequence(order_id, expected, events)?;
        Self::insert_events(&mut tx, &envelopes).await?;

        tx.commit().await?;
        Ok(new_version)
    }

    async fn get_order_events(&self, order_id: OrderId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, version, event_type, payload, timestamp
            FROM order_events
            WHERE order_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }
}

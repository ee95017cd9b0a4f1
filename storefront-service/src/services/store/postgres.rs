//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::Store;
use crate::models::{
    CartItem, NewProduct, Order, OrderItem, OrderStatus, Product, ProductFilter, ProductPatch,
    StatusChange,
};
use crate::services::metrics::db_timer;

const PRODUCT_COLUMNS: &str =
    "product_id, name, description, price, image_url, created_utc, updated_utc";

#[derive(FromRow)]
struct OrderRow {
    order_id: Uuid,
    user_id: Uuid,
    total_amount: Decimal,
    status: String,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, AppError> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown order status '{}' on order {}",
                self.status,
                self.order_id
            ))
        })?;
        Ok(Order {
            order_id: self.order_id,
            user_id: self.user_id,
            total_amount: self.total_amount,
            status,
            created_utc: self.created_utc,
            updated_utc: self.updated_utc,
            items,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    order_item_id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            order_item_id: row.order_item_id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "storefront-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn items_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, AppError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT order_item_id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load order items", e))?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, AppError> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.order_id).collect();
        let mut items = self.items_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.order_id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn insert_order(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, total_amount, status, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.order_id)
        .bind(order.user_id)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_utc)
        .bind(order.updated_utc)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("Failed to insert order", e))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_item_id, order_id, product_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.order_item_id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("Failed to insert order item", e))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let _timer = db_timer("get_product");

        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get product", e))
    }

    #[instrument(skip(self))]
    async fn list_products(&self, filter: &ProductFilter) -> Result<(Vec<Product>, u64), AppError> {
        let _timer = db_timer("list_products");

        let pattern = filter
            .query
            .as_ref()
            .map(|q| format!("%{}%", q.to_lowercase()));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE ($1::text IS NULL OR LOWER(name) LIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count products", e))?;

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::text IS NULL OR LOWER(name) LIKE $1)
            ORDER BY created_utc DESC, product_id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(i64::from(filter.limit))
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list products", e))?;

        Ok((products, total.max(0) as u64))
    }

    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    async fn products_by_ids(&self, product_ids: &[Uuid]) -> Result<Vec<Product>, AppError> {
        let _timer = db_timer("products_by_ids");

        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ANY($1)"
        ))
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load products", e))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_product(&self, input: &NewProduct) -> Result<Product, AppError> {
        let _timer = db_timer("create_product");

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (product_id, name, description, price, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create product", e))?;

        info!(product_id = %product.product_id, "Product created");

        Ok(product)
    }

    #[instrument(skip(self, patch), fields(product_id = %product_id))]
    async fn update_product(
        &self,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        let _timer = db_timer("update_product");

        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url),
                updated_utc = NOW()
            WHERE product_id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.price)
        .bind(&patch.image_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update product", e))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn delete_product(&self, product_id: Uuid) -> Result<bool, AppError> {
        let _timer = db_timer("delete_product");

        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete product", e))?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>, AppError> {
        let _timer = db_timer("cart_items");

        sqlx::query_as::<_, CartItem>(
            r#"
            SELECT cart_item_id, user_id, product_id, quantity, created_utc
            FROM cart_items
            WHERE user_id = $1
            ORDER BY created_utc, cart_item_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load cart", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, AppError> {
        let _timer = db_timer("add_to_cart");

        if self.get_product(product_id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
        }

        let line = CartItem::new(user_id, product_id, quantity);
        sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (cart_item_id, user_id, product_id, quantity, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $6)
            RETURNING cart_item_id, user_id, product_id, quantity, created_utc
            "#,
        )
        .bind(line.cart_item_id)
        .bind(line.user_id)
        .bind(line.product_id)
        .bind(line.quantity.min(CartItem::MAX_QUANTITY))
        .bind(line.created_utc)
        .bind(CartItem::MAX_QUANTITY)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to add to cart", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id, cart_item_id = %cart_item_id))]
    async fn update_cart_item(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, AppError> {
        let _timer = db_timer("update_cart_item");

        sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items SET quantity = $3
            WHERE cart_item_id = $1 AND user_id = $2
            RETURNING cart_item_id, user_id, product_id, quantity, created_utc
            "#,
        )
        .bind(cart_item_id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update cart item", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id, cart_item_id = %cart_item_id))]
    async fn remove_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<bool, AppError> {
        let _timer = db_timer("remove_cart_item");

        let result = sqlx::query("DELETE FROM cart_items WHERE cart_item_id = $1 AND user_id = $2")
            .bind(cart_item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to remove cart item", e))?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn place_order(&self, user_id: Uuid) -> Result<Order, AppError> {
        let _timer = db_timer("place_order");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        // Locking the cart rows serialises concurrent checkouts of one cart
        let lines = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT cart_item_id, user_id, product_id, quantity, created_utc
            FROM cart_items
            WHERE user_id = $1
            ORDER BY created_utc, cart_item_id
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to load cart", e))?;

        let product_ids: Vec<Uuid> = lines.iter().map(|c| c.product_id).collect();
        let products: HashMap<Uuid, Product> = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = ANY($1)"
        ))
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to load products", e))?
        .into_iter()
        .map(|p| (p.product_id, p))
        .collect();

        let order = match Order::from_cart(user_id, &lines, &products) {
            Ok(order) => order,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e.into());
            }
        };

        Self::insert_order(&mut tx, &order).await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to clear cart", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        info!(
            order_id = %order.order_id,
            total_amount = %order.total_amount,
            item_count = order.items.len(),
            "Order placed"
        );

        Ok(order)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let _timer = db_timer("list_orders");

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT order_id, user_id, total_amount, status, created_utc, updated_utc
            FROM orders
            WHERE user_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list orders", e))?;

        self.hydrate(rows).await
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let _timer = db_timer("get_order");

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT order_id, user_id, total_amount, status, created_utc, updated_utc
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get order", e))?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    async fn get_user_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError> {
        Ok(self
            .get_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id))
    }

    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    async fn delete_order(&self, user_id: Uuid, order_id: Uuid) -> Result<bool, AppError> {
        let _timer = db_timer("delete_order");

        let result = sqlx::query("DELETE FROM orders WHERE order_id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete order", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(order_id = %order_id, next = %next))]
    async fn transition_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<StatusChange, AppError> {
        let _timer = db_timer("transition_status");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to lock order", e))?;

        let Some(current) = current else {
            tx.rollback().await.ok();
            return Ok(StatusChange::NotFound);
        };

        let Some(current) = OrderStatus::parse(&current) else {
            tx.rollback().await.ok();
            warn!(status = %current, "Order has unknown status");
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Unknown order status '{}'",
                current
            )));
        };

        let change = current.transition_to(next);
        if let StatusChange::Applied { to, .. } = change {
            sqlx::query("UPDATE orders SET status = $2, updated_utc = NOW() WHERE order_id = $1")
                .bind(order_id)
                .bind(to.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to update order status", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        Ok(change)
    }
}

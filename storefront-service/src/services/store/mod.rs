//! Persistence for catalog, carts and orders.
//!
//! Operations that must be atomic (placing an order, moving an order's
//! status) are single trait methods so each backend can run them as one
//! unit of work.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    CartItem, NewProduct, Order, OrderStatus, Product, ProductFilter, ProductPatch, StatusChange,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // Catalog

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError>;

    /// One page of products matching `filter`, plus the total match count.
    async fn list_products(&self, filter: &ProductFilter) -> Result<(Vec<Product>, u64), AppError>;

    async fn products_by_ids(&self, product_ids: &[Uuid]) -> Result<Vec<Product>, AppError>;

    async fn create_product(&self, input: &NewProduct) -> Result<Product, AppError>;

    async fn update_product(
        &self,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, AppError>;

    async fn delete_product(&self, product_id: Uuid) -> Result<bool, AppError>;

    // Cart

    /// The user's cart lines, oldest first.
    async fn cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>, AppError>;

    /// Adds `quantity` of a product, merging with an existing line for the
    /// same product. Fails with `NotFound` for unknown products.
    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, AppError>;

    async fn update_cart_item(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, AppError>;

    async fn remove_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<bool, AppError>;

    // Orders

    /// Snapshots the user's cart into a pending order and empties the cart,
    /// atomically. Checkout errors surface as `BadRequest`/`NotFound` and
    /// leave the cart untouched.
    async fn place_order(&self, user_id: Uuid) -> Result<Order, AppError>;

    /// The user's orders, newest first.
    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    async fn get_user_order(&self, user_id: Uuid, order_id: Uuid)
        -> Result<Option<Order>, AppError>;

    async fn delete_order(&self, user_id: Uuid, order_id: Uuid) -> Result<bool, AppError>;

    /// Reads the current status, decides via [`OrderStatus::transition_to`]
    /// and writes, with the order locked for the duration.
    async fn transition_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<StatusChange, AppError>;
}

/// Merged cart quantity, held to the per-line maximum.
pub(crate) fn merged_quantity(existing: i32, added: i32) -> i32 {
    existing.saturating_add(added).min(CartItem::MAX_QUANTITY)
}

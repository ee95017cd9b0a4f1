//! In-process store used when no database is configured, and in tests.
//!
//! One `RwLock` guards all tables, so every write is a single critical
//! section and multi-table operations are atomic.

use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{merged_quantity, Store};
use crate::models::{
    CartItem, NewProduct, Order, OrderStatus, Product, ProductFilter, ProductPatch, StatusChange,
};

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    cart: Vec<CartItem>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<(Vec<Product>, u64), AppError> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matches.sort_by(|a, b| {
            b.created_utc
                .cmp(&a.created_utc)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn products_by_ids(&self, product_ids: &[Uuid]) -> Result<Vec<Product>, AppError> {
        let tables = self.tables.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn create_product(&self, input: &NewProduct) -> Result<Product, AppError> {
        let now = Utc::now();
        let product = Product {
            product_id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            image_url: input.image_url.clone(),
            created_utc: now,
            updated_utc: now,
        };
        self.tables
            .write()
            .await
            .products
            .insert(product.product_id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(product) = tables.products.get_mut(&product_id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            product.name = name.clone();
        }
        if let Some(description) = &patch.description {
            product.description = description.clone();
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(image_url) = &patch.image_url {
            product.image_url = Some(image_url.clone());
        }
        product.updated_utc = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, product_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .tables
            .write()
            .await
            .products
            .remove(&product_id)
            .is_some())
    }

    async fn cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&product_id) {
            return Err(AppError::NotFound(anyhow::anyhow!("Product not found")));
        }

        if let Some(line) = tables
            .cart
            .iter_mut()
            .find(|c| c.user_id == user_id && c.product_id == product_id)
        {
            line.quantity = merged_quantity(line.quantity, quantity);
            return Ok(line.clone());
        }

        let line = CartItem::new(user_id, product_id, quantity);
        tables.cart.push(line.clone());
        Ok(line)
    }

    async fn update_cart_item(
        &self,
        user_id: Uuid,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .cart
            .iter_mut()
            .find(|c| c.cart_item_id == cart_item_id && c.user_id == user_id)
            .map(|line| {
                line.quantity = quantity;
                line.clone()
            }))
    }

    async fn remove_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.cart.len();
        tables
            .cart
            .retain(|c| !(c.cart_item_id == cart_item_id && c.user_id == user_id));
        Ok(tables.cart.len() != before)
    }

    async fn place_order(&self, user_id: Uuid) -> Result<Order, AppError> {
        let mut tables = self.tables.write().await;

        let lines: Vec<CartItem> = tables
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        let products: HashMap<Uuid, Product> = lines
            .iter()
            .filter_map(|c| {
                tables
                    .products
                    .get(&c.product_id)
                    .map(|p| (p.product_id, p.clone()))
            })
            .collect();

        let order = Order::from_cart(user_id, &lines, &products)?;

        tables.cart.retain(|c| c.user_id != user_id);
        tables.orders.insert(order.order_id, order.clone());

        Ok(order)
    }

    async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn get_user_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn delete_order(&self, user_id: Uuid, order_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.orders.get(&order_id) {
            Some(order) if order.user_id == user_id => {
                tables.orders.remove(&order_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<StatusChange, AppError> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(&order_id) else {
            return Ok(StatusChange::NotFound);
        };

        let change = order.status.transition_to(next);
        if let StatusChange::Applied { to, .. } = change {
            order.status = to;
            order.updated_utc = Utc::now();
        }
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Arc;

    async fn product(store: &MemoryStore, price: &str) -> Product {
        store
            .create_product(&NewProduct {
                name: "Denim jacket".into(),
                description: "Washed blue".into(),
                price: Decimal::from_str(price).unwrap(),
                image_url: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_to_cart_merges_lines() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let p = product(&store, "10.00").await;

        store.add_to_cart(user, p.product_id, 2).await.unwrap();
        let line = store.add_to_cart(user, p.product_id, 3).await.unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(store.cart_items(user).await.unwrap().len(), 1);

        let line = store.add_to_cart(user, p.product_id, 99).await.unwrap();
        assert_eq!(line.quantity, CartItem::MAX_QUANTITY);
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .add_to_cart(Uuid::new_v4(), Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_and_keeps_other_users() {
        let store = MemoryStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let a = product(&store, "10.00").await;
        let b = product(&store, "5.00").await;

        store.add_to_cart(alice, a.product_id, 2).await.unwrap();
        store.add_to_cart(alice, b.product_id, 1).await.unwrap();
        store.add_to_cart(bob, a.product_id, 1).await.unwrap();

        let order = store.place_order(alice).await.unwrap();
        assert_eq!(order.total_amount, Decimal::from_str("25.00").unwrap());
        assert!(store.cart_items(alice).await.unwrap().is_empty());
        assert_eq!(store.cart_items(bob).await.unwrap().len(), 1);
        assert_eq!(
            store.get_user_order(alice, order.order_id).await.unwrap(),
            Some(order.clone())
        );
        assert_eq!(store.get_user_order(bob, order.order_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_place_order_with_deleted_product_keeps_cart() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let p = product(&store, "10.00").await;
        store.add_to_cart(user, p.product_id, 1).await.unwrap();
        store.delete_product(p.product_id).await.unwrap();

        let err = store.place_order(user).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(err.to_string().contains(&p.product_id.to_string()));
        assert_eq!(store.cart_items(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_total_ignores_later_price_changes() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let p = product(&store, "10.00").await;
        store.add_to_cart(user, p.product_id, 2).await.unwrap();
        let order = store.place_order(user).await.unwrap();

        store
            .update_product(
                p.product_id,
                &ProductPatch {
                    price: Some(Decimal::from_str("99.00").unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = store.get_order(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.total_amount, Decimal::from_str("20.00").unwrap());
        assert_eq!(stored.items[0].unit_price, Decimal::from_str("10.00").unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_transitions_apply_once() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let p = product(&store, "1.00").await;
        store.add_to_cart(user, p.product_id, 1).await.unwrap();
        let order = store.place_order(user).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .transition_status(order.order_id, OrderStatus::Paid)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut applied = 0;
        for h in handles {
            if matches!(h.await.unwrap(), StatusChange::Applied { .. }) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);

        let change = store
            .transition_status(order.order_id, OrderStatus::Failed)
            .await
            .unwrap();
        assert_eq!(change, StatusChange::AlreadyPaid);
        assert_eq!(
            store.get_order(order.order_id).await.unwrap().unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_list_products_filters_and_pages() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            product(&store, "1.00").await;
        }
        store
            .create_product(&NewProduct {
                name: "Silk Scarf".into(),
                description: "Red".into(),
                price: Decimal::ONE,
                image_url: None,
            })
            .await
            .unwrap();

        let (page, total) = store
            .list_products(&ProductFilter::new(None, Some(2), Some(4)))
            .await
            .unwrap();
        assert_eq!(total, 6);
        assert_eq!(page.len(), 2);

        let (page, total) = store
            .list_products(&ProductFilter::new(Some("scarf".into()), None, None))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].name, "Silk Scarf");
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::ProductSummary;
use crate::models::{CartItem, Product};

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1, max = 100, message = "Quantity must be between 1 and 100"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, max = 100, message = "Quantity must be between 1 and 100"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_utc: DateTime<Utc>,
    /// Current catalog entry; absent once the product has been deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.cart_item_id,
            product_id: item.product_id,
            quantity: item.quantity,
            created_utc: item.created_utc,
            product: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    /// Sum over lines whose product still exists, at current prices.
    pub subtotal: Decimal,
}

impl CartResponse {
    pub fn new(items: Vec<CartItem>, products: &HashMap<Uuid, Product>) -> Self {
        let mut subtotal = Decimal::ZERO;
        let items = items
            .into_iter()
            .map(|item| {
                let product = products.get(&item.product_id);
                if let Some(p) = product {
                    subtotal += p.price * Decimal::from(item.quantity);
                }
                CartItemResponse {
                    product: product.map(ProductSummary::from),
                    ..CartItemResponse::from(item)
                }
            })
            .collect();

        Self { items, subtotal }
    }
}

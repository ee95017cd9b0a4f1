use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderItem, OrderStatus, PaymentDirective, Product};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(length(max = 32, message = "Payment method is too long"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestPaymentRequest {
    #[validate(length(min = 1, max = 32, message = "Payment method is required"))]
    pub method: String,
}

/// Current catalog view of a product referenced by a cart line or order item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: p.product_id,
            name: p.name.clone(),
            price: p.price,
            image_url: p.image_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price at checkout time.
    pub unit_price: Decimal,
    pub line_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.order_item_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total(),
            product: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self::with_products(order, &HashMap::new())
    }
}

impl OrderResponse {
    pub fn with_products(order: Order, products: &HashMap<Uuid, Product>) -> Self {
        Self {
            id: order.order_id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            created_utc: order.created_utc,
            updated_utc: order.updated_utc,
            items: order
                .items
                .into_iter()
                .map(|item| {
                    let product = products.get(&item.product_id).map(ProductSummary::from);
                    OrderItemResponse {
                        product,
                        ..OrderItemResponse::from(item)
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order: OrderResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDirective>,
}

#[derive(Debug, Serialize)]
pub struct PayResponse {
    pub order: OrderResponse,
    pub message: String,
}

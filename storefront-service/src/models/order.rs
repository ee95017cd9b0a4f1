//! Orders, their price-snapshot items and the status state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{CartItem, Product};
use crate::error::CheckoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Decide what moving to `next` means. `Paid` never leaves `Paid`;
    /// everything else may move, including `Failed -> Paid` on a retry.
    pub fn transition_to(self, next: OrderStatus) -> StatusChange {
        if self == OrderStatus::Paid {
            StatusChange::AlreadyPaid
        } else if self == next {
            StatusChange::Unchanged(self)
        } else {
            StatusChange::Applied {
                from: self,
                to: next,
            }
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of asking the store to move an order to a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied { from: OrderStatus, to: OrderStatus },
    Unchanged(OrderStatus),
    AlreadyPaid,
    NotFound,
}

impl StatusChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged(_) => "unchanged",
            Self::AlreadyPaid => "already_paid",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub order_item_id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Snapshot a cart into a new pending order. Prices are copied from
    /// `products` now and never looked up again. Cart line order is kept.
    pub fn from_cart(
        user_id: Uuid,
        cart: &[CartItem],
        products: &HashMap<Uuid, Product>,
    ) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order_id = Uuid::new_v4();
        let mut items = Vec::with_capacity(cart.len());
        for line in cart {
            let product = products
                .get(&line.product_id)
                .ok_or(CheckoutError::ProductUnavailable(line.product_id))?;
            items.push(OrderItem {
                order_item_id: Uuid::new_v4(),
                order_id,
                product_id: product.product_id,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let total_amount = items.iter().map(OrderItem::line_total).sum();
        let now = Utc::now();

        Ok(Order {
            order_id,
            user_id,
            total_amount,
            status: OrderStatus::Pending,
            created_utc: now,
            updated_utc: now,
            items,
        })
    }

    /// Order id as 32 lowercase hex digits, the form gateways carry as
    /// their correlation reference.
    pub fn reference(&self) -> String {
        self.order_id.simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn product(price: &str) -> Product {
        Product {
            product_id: Uuid::new_v4(),
            name: "Linen shirt".to_string(),
            description: "Loose fit".to_string(),
            price: Decimal::from_str(price).unwrap(),
            image_url: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn test_from_cart_at_price_and_quantity_caps() {
        let user = Uuid::new_v4();
        let a = product("9999999999.99");
        let b = product("9999999999.99");
        let cart = vec![
            CartItem::new(user, a.product_id, CartItem::MAX_QUANTITY),
            CartItem::new(user, b.product_id, CartItem::MAX_QUANTITY),
        ];
        let products: HashMap<_, _> = [(a.product_id, a), (b.product_id, b)]
            .into_iter()
            .collect();

        let order = Order::from_cart(user, &cart, &products).unwrap();

        assert_eq!(
            order.total_amount,
            Decimal::from_str("1999999999998.00").unwrap()
        );
        assert!(order.total_amount.scale() <= 2);
    }

    #[test]
    fn test_from_cart_sums_snapshot_prices() {
        let user = Uuid::new_v4();
        let a = product("10.00");
        let b = product("5.00");
        let cart = vec![
            CartItem::new(user, a.product_id, 2),
            CartItem::new(user, b.product_id, 1),
        ];
        let products: HashMap<_, _> = [(a.product_id, a.clone()), (b.product_id, b.clone())]
            .into_iter()
            .collect();

        let order = Order::from_cart(user, &cart, &products).unwrap();

        assert_eq!(order.total_amount, Decimal::from_str("25.00").unwrap());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_id, a.product_id);
        assert!(order.items.iter().all(|i| i.order_id == order.order_id));
        let sum: Decimal = order.items.iter().map(OrderItem::line_total).sum();
        assert_eq!(sum, order.total_amount);
    }

    #[test]
    fn test_from_cart_is_exact_for_fractional_prices() {
        let user = Uuid::new_v4();
        let p = product("0.10");
        let cart = vec![CartItem::new(user, p.product_id, 3)];
        let products: HashMap<_, _> = [(p.product_id, p)].into_iter().collect();

        let order = Order::from_cart(user, &cart, &products).unwrap();
        assert_eq!(order.total_amount, Decimal::from_str("0.30").unwrap());
    }

    #[test]
    fn test_from_cart_rejects_empty_cart() {
        let err = Order::from_cart(Uuid::new_v4(), &[], &HashMap::new()).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[test]
    fn test_from_cart_names_missing_product() {
        let user = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let cart = vec![CartItem::new(user, gone, 1)];

        let err = Order::from_cart(user, &cart, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable(id) if id == gone));
        assert!(err.to_string().contains(&gone.to_string()));
    }

    #[test]
    fn test_paid_is_terminal() {
        assert_eq!(
            OrderStatus::Paid.transition_to(OrderStatus::Failed),
            StatusChange::AlreadyPaid
        );
        assert_eq!(
            OrderStatus::Paid.transition_to(OrderStatus::Paid),
            StatusChange::AlreadyPaid
        );
    }

    #[test]
    fn test_transitions() {
        assert_eq!(
            OrderStatus::Pending.transition_to(OrderStatus::Paid),
            StatusChange::Applied {
                from: OrderStatus::Pending,
                to: OrderStatus::Paid
            }
        );
        assert_eq!(
            OrderStatus::Failed.transition_to(OrderStatus::Paid),
            StatusChange::Applied {
                from: OrderStatus::Failed,
                to: OrderStatus::Paid
            }
        );
        assert_eq!(
            OrderStatus::Failed.transition_to(OrderStatus::Failed),
            StatusChange::Unchanged(OrderStatus::Failed)
        );
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for s in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Failed] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }
}

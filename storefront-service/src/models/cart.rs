use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One cart line. A user holds at most one line per product.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub cart_item_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_utc: DateTime<Utc>,
}

impl CartItem {
    pub const MAX_QUANTITY: i32 = 100;

    pub fn new(user_id: Uuid, product_id: Uuid, quantity: i32) -> Self {
        Self {
            cart_item_id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_utc: Utc::now(),
        }
    }
}

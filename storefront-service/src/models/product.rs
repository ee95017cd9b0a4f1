//! Catalog product.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub image_url: Option<String>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
}

/// Name filter plus 1-based page.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl ProductFilter {
    pub const DEFAULT_LIMIT: u32 = 12;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamps paging input: pages start at 1, limits outside 1..=100 fall
    /// back to the default. Blank queries are dropped.
    pub fn new(query: Option<String>, page: Option<u32>, limit: Option<u32>) -> Self {
        let limit = match limit {
            Some(l) if (1..=Self::MAX_LIMIT).contains(&l) => l,
            _ => Self::DEFAULT_LIMIT,
        };
        Self {
            query: query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            page: page.unwrap_or(1).max(1),
            limit,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Case-insensitive substring match on the product name.
    pub fn matches(&self, product: &Product) -> bool {
        match &self.query {
            Some(q) => product.name.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

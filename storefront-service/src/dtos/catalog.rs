use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validate_price;
use crate::models::{NewProduct, Product, ProductFilter, ProductPatch};

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<ListProductsQuery> for ProductFilter {
    fn from(query: ListProductsQuery) -> Self {
        ProductFilter::new(query.q, query.page, query.limit)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,

    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: Option<String>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            image_url: req.image_url,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,

    #[validate(url(message = "Image must be a valid URL"))]
    pub image_url: Option<String>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            image_url: req.image_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.product_id,
            name: p.name,
            description: p.description,
            price: p.price,
            image_url: p.image_url,
            created_utc: p.created_utc,
            updated_utc: p.updated_utc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub items: Vec<ProductResponse>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl ProductListResponse {
    pub fn new(products: Vec<Product>, filter: &ProductFilter, total: u64) -> Self {
        Self {
            items: products.into_iter().map(ProductResponse::from).collect(),
            page: filter.page,
            limit: filter.limit,
            total,
            total_pages: total.div_ceil(u64::from(filter.limit)),
        }
    }
}

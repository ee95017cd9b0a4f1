pub mod cart;
pub mod catalog;
pub mod orders;

pub use cart::{AddToCartRequest, CartItemResponse, CartResponse, UpdateCartItemRequest};
pub use catalog::{
    CreateProductRequest, ListProductsQuery, ProductListResponse, ProductResponse,
    UpdateProductRequest,
};
pub use orders::{
    OrderItemResponse, OrderResponse, PayResponse, PlaceOrderRequest, PlaceOrderResponse,
    ProductSummary, RequestPaymentRequest,
};

use rust_decimal::Decimal;
use validator::ValidationError;

/// Prices are non-negative with at most two decimal places.
pub(crate) fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        return Err(ValidationError::new("price_negative"));
    }
    if price.normalize().scale() > 2 {
        return Err(ValidationError::new("price_precision"));
    }
    if *price >= Decimal::from(10_000_000_000i64) {
        return Err(ValidationError::new("price_too_large"));
    }
    Ok(())
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::collections::HashMap;
use uuid::Uuid;

use crate::dtos::{AddToCartRequest, CartItemResponse, CartResponse, UpdateCartItemRequest};
use crate::middleware::AuthUser;
use crate::utils::ValidatedJson;
use crate::AppState;

fn cart_item_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Cart item not found"))
}

pub async fn get_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CartResponse>, AppError> {
    let items = state.store.cart_items(user_id).await?;
    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = state
        .store
        .products_by_ids(&ids)
        .await?
        .into_iter()
        .map(|p| (p.product_id, p))
        .collect::<HashMap<_, _>>();

    Ok(Json(CartResponse::new(items, &products)))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidatedJson(req): ValidatedJson<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>), AppError> {
    let item = state
        .store
        .add_to_cart(user_id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(CartItemResponse::from(item))))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(cart_item_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateCartItemRequest>,
) -> Result<Json<CartItemResponse>, AppError> {
    let item = state
        .store
        .update_cart_item(user_id, cart_item_id, req.quantity)
        .await?
        .ok_or_else(cart_item_not_found)?;
    Ok(Json(CartItemResponse::from(item)))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(cart_item_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.remove_cart_item(user_id, cart_item_id).await? {
        return Err(cart_item_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

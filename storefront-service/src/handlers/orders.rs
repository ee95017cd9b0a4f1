use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::dtos::{
    OrderResponse, PayResponse, PlaceOrderRequest, PlaceOrderResponse, RequestPaymentRequest,
};
use crate::middleware::AuthUser;
use crate::models::{Order, PaymentDirective, Product};
use crate::utils::{ClientIp, ValidatedJson};
use crate::AppState;

fn order_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Order not found"))
}

/// Current catalog entries for everything the orders reference.
async fn products_for(state: &AppState, orders: &[Order]) -> Result<HashMap<Uuid, Product>, AppError> {
    let mut ids: Vec<Uuid> = orders
        .iter()
        .flat_map(|o| o.items.iter().map(|i| i.product_id))
        .collect();
    ids.sort();
    ids.dedup();

    Ok(state
        .store
        .products_by_ids(&ids)
        .await?
        .into_iter()
        .map(|p| (p.product_id, p))
        .collect())
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.store.list_orders(user_id).await?;
    let products = products_for(&state, &orders).await?;
    Ok(Json(
        orders
            .into_iter()
            .map(|o| OrderResponse::with_products(o, &products))
            .collect(),
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .store
        .get_user_order(user_id, order_id)
        .await?
        .ok_or_else(order_not_found)?;
    let products = products_for(&state, std::slice::from_ref(&order)).await?;
    Ok(Json(OrderResponse::with_products(order, &products)))
}

pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    client_ip: ClientIp,
    ValidatedJson(req): ValidatedJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), AppError> {
    let (order, payment) = state
        .checkout
        .place_order(user_id, req.payment_method.as_deref(), &client_ip.context())
        .await?;

    info!(
        order_id = %order.order_id,
        user_id = %user_id,
        total_amount = %order.total_amount,
        "Checkout completed"
    );

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            order: OrderResponse::from(order),
            payment,
        }),
    ))
}

pub async fn delete_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_order(user_id, order_id).await? {
        return Err(order_not_found());
    }
    info!(order_id = %order_id, user_id = %user_id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pay_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PayResponse>, AppError> {
    let order = state.orders.pay_manually(user_id, order_id).await?;
    Ok(Json(PayResponse {
        order: OrderResponse::from(order),
        message: "Payment successful".to_string(),
    }))
}

pub async fn request_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<Uuid>,
    client_ip: ClientIp,
    ValidatedJson(req): ValidatedJson<RequestPaymentRequest>,
) -> Result<Json<PaymentDirective>, AppError> {
    let directive = state
        .checkout
        .request_payment(user_id, order_id, &req.method, &client_ip.context())
        .await?;
    Ok(Json(directive))
}

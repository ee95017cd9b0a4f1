use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use tracing::info;
use uuid::Uuid;

use crate::dtos::{
    CreateProductRequest, ListProductsQuery, ProductListResponse, ProductResponse,
    UpdateProductRequest,
};
use crate::middleware::AuthUser;
use crate::models::ProductFilter;
use crate::utils::ValidatedJson;
use crate::AppState;

fn product_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Product not found"))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ProductListResponse>, AppError> {
    let filter = ProductFilter::from(query);
    let (products, total) = state.store.list_products(&filter).await?;
    Ok(Json(ProductListResponse::new(products, &filter, total)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(product_not_found)?;
    Ok(Json(ProductResponse::from(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    let product = state.store.create_product(&req.into()).await?;
    info!(product_id = %product.product_id, user_id = %user_id, "Product created");
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .store
        .update_product(product_id, &req.into())
        .await?
        .ok_or_else(product_not_found)?;
    info!(product_id = %product_id, user_id = %user_id, "Product updated");
    Ok(Json(ProductResponse::from(product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_product(product_id).await? {
        return Err(product_not_found());
    }
    info!(product_id = %product_id, user_id = %user_id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

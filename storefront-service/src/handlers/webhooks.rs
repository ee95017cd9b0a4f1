//! Gateway callback endpoints.
//!
//! Every callback is verified by its adapter before anything else is read.
//! Verified callbacks are acknowledged with 200 whether or not they changed
//! an order; rejected signatures get a bare 401.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::models::{CallbackRequest, PaymentCallback, PaymentMethod, StatusChange};
use crate::AppState;

async fn verify_and_reconcile(
    state: &AppState,
    method: PaymentMethod,
    request: CallbackRequest,
) -> Result<(PaymentCallback, Option<StatusChange>), AppError> {
    let Some(gateway) = state.gateways.get(method) else {
        warn!(gateway = %method, "Callback for unregistered gateway");
        return Err(AppError::ServiceUnavailable);
    };

    let callback = gateway.verify_callback(&request).await.map_err(|e| {
        match &e {
            GatewayError::InvalidSignature(reason) => {
                warn!(gateway = %method, reason = %reason, "Callback signature rejected");
            }
            other => {
                warn!(gateway = %method, error = %other, "Callback rejected");
            }
        }
        AppError::from(e)
    })?;

    info!(
        gateway = %method,
        order_id = ?callback.order_id,
        outcome = callback.outcome.as_str(),
        "Callback verified"
    );

    let change = state.reconciler.reconcile(&callback).await?;
    Ok((callback, change))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request = CallbackRequest {
        body: body.to_vec(),
        headers,
        query: String::new(),
    };
    verify_and_reconcile(&state, PaymentMethod::Stripe, request).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn payos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request = CallbackRequest {
        body: body.to_vec(),
        headers,
        query: String::new(),
    };
    verify_and_reconcile(&state, PaymentMethod::Payos, request).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Browser redirect back from the VNPAY payment page.
pub async fn vnpay_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let request = CallbackRequest {
        body: Vec::new(),
        headers,
        query: query.unwrap_or_default(),
    };
    let (callback, _) = verify_and_reconcile(&state, PaymentMethod::Vnpay, request).await?;

    let status = match callback.order_id {
        Some(order_id) => state
            .store
            .get_order(order_id)
            .await?
            .map(|o| o.status.as_str()),
        None => None,
    };

    Ok(Json(json!({
        "ok": true,
        "status": status.unwrap_or(callback.outcome.as_str()),
    })))
}

/// Server-to-server payment notification from VNPAY.
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let request = CallbackRequest {
        body: Vec::new(),
        headers,
        query: query.unwrap_or_default(),
    };
    verify_and_reconcile(&state, PaymentMethod::Vnpay, request).await?;
    Ok(Json(json!({ "RspCode": "00", "Message": "Confirm Success" })))
}

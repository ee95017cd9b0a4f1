use service_core::error::AppError;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{Order, OrderStatus, StatusChange};
use crate::services::reconciliation::OrderReconciler;
use crate::services::store::Store;

/// Order operations initiated by the customer rather than a gateway.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    reconciler: OrderReconciler,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, reconciler: OrderReconciler) -> Self {
        Self { store, reconciler }
    }

    /// Marks the user's order paid without a gateway round trip.
    pub async fn pay_manually(&self, user_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
        let order = self
            .store
            .get_user_order(user_id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

        if order.status == OrderStatus::Paid {
            return Err(AppError::Conflict(anyhow::anyhow!("Order is already paid")));
        }

        match self.reconciler.apply_status(order_id, OrderStatus::Paid).await? {
            StatusChange::AlreadyPaid => {
                return Err(AppError::Conflict(anyhow::anyhow!("Order is already paid")))
            }
            StatusChange::NotFound => {
                return Err(AppError::NotFound(anyhow::anyhow!("Order not found")))
            }
            _ => {}
        }

        info!(order_id = %order_id, user_id = %user_id, "Order paid manually");

        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))
    }
}

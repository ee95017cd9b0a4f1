//! Applies verified gateway outcomes to orders.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{OrderStatus, PaymentCallback, StatusChange};
use crate::services::metrics;
use crate::services::store::Store;

#[derive(Clone)]
pub struct OrderReconciler {
    store: Arc<dyn Store>,
}

impl OrderReconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Moves an order to `status` if the state machine allows it. Unknown
    /// orders come back as `StatusChange::NotFound`.
    pub async fn apply_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<StatusChange, AppError> {
        let change = self.store.transition_status(order_id, status).await?;

        match change {
            StatusChange::Applied { from, to } => {
                info!(order_id = %order_id, from = %from, to = %to, "Order status updated");
            }
            StatusChange::Unchanged(current) => {
                info!(order_id = %order_id, status = %current, "Order already in requested status");
            }
            StatusChange::AlreadyPaid => {
                info!(order_id = %order_id, requested = %status, "Order already paid, ignoring");
            }
            StatusChange::NotFound => {
                warn!(order_id = %order_id, "Order not found for status update");
            }
        }

        Ok(change)
    }

    /// Applies a verified callback. Returns `None` when the callback carries
    /// nothing actionable (indeterminate outcome or no resolvable order).
    pub async fn reconcile(
        &self,
        callback: &PaymentCallback,
    ) -> Result<Option<StatusChange>, AppError> {
        let gateway = callback.gateway.as_str();

        let Some(order_id) = callback.order_id else {
            warn!(gateway = gateway, "Verified callback without a resolvable order reference");
            metrics::record_callback(gateway, "unresolved");
            return Ok(None);
        };

        let Some(target) = callback.outcome.target_status() else {
            info!(
                gateway = gateway,
                order_id = %order_id,
                "Callback outcome is indeterminate, leaving order unchanged"
            );
            metrics::record_callback(gateway, "ignored");
            return Ok(None);
        };

        let change = self.apply_status(order_id, target).await?;
        metrics::record_callback(gateway, change.as_str());

        Ok(Some(change))
    }
}

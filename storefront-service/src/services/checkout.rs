//! Checkout: turns a cart into an order and asks the chosen gateway how the
//! customer should pay for it.

use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::error::GatewayError;
use crate::models::{Order, OrderStatus, PaymentContext, PaymentDirective, PaymentMethod};
use crate::services::gateways::GatewayRegistry;
use crate::services::metrics;
use crate::services::store::Store;

#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn Store>,
    gateways: GatewayRegistry,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn Store>, gateways: GatewayRegistry) -> Self {
        Self { store, gateways }
    }

    /// Places an order from the user's cart. A recognised `payment_method`
    /// also yields a directive; unknown or absent methods leave the order
    /// for manual payment. The order is kept even if the gateway call fails.
    pub async fn place_order(
        &self,
        user_id: Uuid,
        payment_method: Option<&str>,
        ctx: &PaymentContext,
    ) -> Result<(Order, Option<PaymentDirective>), AppError> {
        let order = self.store.place_order(user_id).await?;

        let method = payment_method.and_then(PaymentMethod::parse);
        if method.is_none() {
            if let Some(requested) = payment_method {
                warn!(
                    order_id = %order.order_id,
                    payment_method = requested,
                    "Unsupported payment method, order left for manual payment"
                );
            }
        }

        metrics::record_order(method.map(|m| m.as_str()).unwrap_or("manual"));

        let directive = match method {
            Some(method) => Some(self.directive_for(&order, method, ctx).await?),
            None => None,
        };

        Ok((order, directive))
    }

    /// Re-issues a payment directive for one of the user's unpaid orders.
    pub async fn request_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        method: &str,
        ctx: &PaymentContext,
    ) -> Result<PaymentDirective, AppError> {
        let method = PaymentMethod::parse(method).ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add("method", ValidationError::new("unsupported_payment_method"));
            AppError::ValidationError(errors)
        })?;

        let order = self
            .store
            .get_user_order(user_id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

        if order.status == OrderStatus::Paid {
            return Err(AppError::Conflict(anyhow::anyhow!("Order is already paid")));
        }

        self.directive_for(&order, method, ctx).await
    }

    async fn directive_for(
        &self,
        order: &Order,
        method: PaymentMethod,
        ctx: &PaymentContext,
    ) -> Result<PaymentDirective, AppError> {
        let Some(gateway) = self.gateways.get(method) else {
            warn!(order_id = %order.order_id, gateway = %method, "Gateway not registered");
            return Err(AppError::ServiceUnavailable);
        };

        match gateway.build_payment_request(order, ctx).await {
            Ok(directive) => {
                info!(order_id = %order.order_id, gateway = %method, "Payment directive issued");
                Ok(directive)
            }
            Err(GatewayError::NotConfigured) => {
                warn!(order_id = %order.order_id, gateway = %method, "Gateway not configured");
                Err(GatewayError::NotConfigured.into())
            }
            Err(e) => {
                error!(order_id = %order.order_id, gateway = %method, error = %e, "Gateway request failed");
                Err(AppError::BadGateway(format!(
                    "{} payment could not be started for order {}; retry with POST /orders/{}/payment",
                    method, order.order_id, order.order_id
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallbackRequest, NewProduct, PaymentCallback};
    use crate::services::gateways::PaymentGateway;
    use crate::services::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct Failing;

    #[async_trait]
    impl PaymentGateway for Failing {
        fn method(&self) -> PaymentMethod {
            PaymentMethod::Payos
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn build_payment_request(
            &self,
            _order: &Order,
            _ctx: &PaymentContext,
        ) -> Result<PaymentDirective, GatewayError> {
            Err(GatewayError::Upstream("connection reset".into()))
        }
        async fn verify_callback(
            &self,
            _request: &CallbackRequest,
        ) -> Result<PaymentCallback, GatewayError> {
            Err(GatewayError::NotConfigured)
        }
    }

    async fn setup() -> (Arc<MemoryStore>, CheckoutService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let mut registry = GatewayRegistry::new();
        registry.register(Arc::new(Failing));
        let service = CheckoutService::new(store.clone(), registry);

        let user = Uuid::new_v4();
        let product = store
            .create_product(&NewProduct {
                name: "Tote".into(),
                description: "Canvas".into(),
                price: Decimal::new(1500, 2),
                image_url: None,
            })
            .await
            .unwrap();
        store.add_to_cart(user, product.product_id, 2).await.unwrap();
        (store, service, user)
    }

    #[tokio::test]
    async fn test_manual_checkout_has_no_directive() {
        let (store, service, user) = setup().await;
        let (order, directive) = service
            .place_order(user, Some("cash"), &PaymentContext::default())
            .await
            .unwrap();

        assert!(directive.is_none());
        assert_eq!(order.total_amount, Decimal::new(3000, 2));
        assert!(store.cart_items(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_order() {
        let (store, service, user) = setup().await;
        let err = service
            .place_order(user, Some("payos"), &PaymentContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadGateway(_)));
        let orders = store.list_orders(user).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert!(err.to_string().contains(&orders[0].order_id.to_string()));
    }

    #[tokio::test]
    async fn test_unregistered_gateway_is_unavailable() {
        let (_store, service, user) = setup().await;
        let err = service
            .place_order(user, Some("stripe"), &PaymentContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable));
    }

    #[tokio::test]
    async fn test_request_payment_rejects_unknown_method() {
        let (_store, service, user) = setup().await;
        let (order, _) = service
            .place_order(user, None, &PaymentContext::default())
            .await
            .unwrap();

        let err = service
            .request_payment(user, order.order_id, "bitcoin", &PaymentContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = service
            .request_payment(user, Uuid::new_v4(), "payos", &PaymentContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

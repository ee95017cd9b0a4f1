//! Payment gateway adapters.
//!
//! Each adapter turns an [`Order`] into whatever the provider needs to start
//! a payment, and turns the provider's callback back into a verified
//! [`PaymentCallback`]. Signatures are always checked before any business
//! field of a callback is read.

pub mod payos;
pub mod stripe;
pub mod vnpay;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::error::GatewayError;
use crate::models::{CallbackRequest, Order, PaymentCallback, PaymentContext, PaymentDirective, PaymentMethod};

pub use payos::PayosGateway;
pub use stripe::StripeGateway;
pub use vnpay::VnpayGateway;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Whether the credentials needed to talk to the provider are present.
    fn is_configured(&self) -> bool;

    async fn build_payment_request(
        &self,
        order: &Order,
        ctx: &PaymentContext,
    ) -> Result<PaymentDirective, GatewayError>;

    async fn verify_callback(&self, request: &CallbackRequest)
        -> Result<PaymentCallback, GatewayError>;
}

/// Lookup from payment method to its adapter.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every adapter from configuration, sharing one HTTP client.
    pub fn from_config(config: &StorefrontConfig, http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StripeGateway::new(
            config.stripe.clone(),
            http.clone(),
        )));
        registry.register(Arc::new(VnpayGateway::new(config.vnpay.clone())));
        registry.register(Arc::new(PayosGateway::new(config.payos.clone(), http)));

        for method in PaymentMethod::ALL {
            match registry.get(method) {
                Some(gateway) if gateway.is_configured() => {
                    tracing::info!(gateway = %method, "Payment gateway configured");
                }
                _ => {
                    tracing::warn!(
                        gateway = %method,
                        "Payment gateway credentials not configured - requests will be rejected"
                    );
                }
            }
        }

        registry
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.method(), gateway);
    }

    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&method).cloned()
    }
}

/// Decimal amount scaled by `factor` and rounded half-to-even, as the
/// providers expect integer amounts.
pub(crate) fn scaled_amount(amount: Decimal, factor: i64) -> Result<i64, GatewayError> {
    (amount * Decimal::from(factor))
        .round()
        .to_i64()
        .ok_or_else(|| GatewayError::MalformedPayload(format!("amount {} out of range", amount)))
}

/// First value of a header as a trimmed string, if present and non-empty.
pub(crate) fn header_value(request: &CallbackRequest, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//! storefront-service: catalog, cart and checkout with Stripe, VNPAY and
//! PayOS payment gateways.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use config::StorefrontConfig;
use middleware::TokenVerifier;
use services::{CheckoutService, GatewayRegistry, OrderReconciler, OrderService, Store};

pub use startup::Application;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StorefrontConfig>,
    pub store: Arc<dyn Store>,
    pub gateways: GatewayRegistry,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub reconciler: OrderReconciler,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(config: StorefrontConfig, store: Arc<dyn Store>, gateways: GatewayRegistry) -> Self {
        let reconciler = OrderReconciler::new(store.clone());
        Self {
            checkout: CheckoutService::new(store.clone(), gateways.clone()),
            orders: OrderService::new(store.clone(), reconciler.clone()),
            verifier: TokenVerifier::new(&config.jwt),
            config: Arc::new(config),
            store,
            gateways,
            reconciler,
        }
    }
}

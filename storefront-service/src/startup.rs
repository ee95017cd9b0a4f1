//! Application startup and lifecycle management.

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::StorefrontConfig;
use crate::handlers;
use crate::services::{init_metrics, GatewayRegistry, MemoryStore, PgStore, Store};
use crate::AppState;

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration. Uses PostgreSQL
    /// when a database URL is configured, otherwise an in-memory store.
    pub async fn build(config: StorefrontConfig) -> Result<Self, AppError> {
        let store: Arc<dyn Store> = match &config.database {
            Some(db) => {
                let store = PgStore::new(
                    db.url.expose_secret(),
                    db.max_connections,
                    db.min_connections,
                )
                .await?;
                store.run_migrations().await?;
                Arc::new(store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set - using in-memory store, data will not persist");
                Arc::new(MemoryStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    /// Build against an existing store.
    pub async fn build_with_store(
        config: StorefrontConfig,
        store: Arc<dyn Store>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let http = reqwest::Client::builder()
            .timeout(config.gateway_timeout)
            .build()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("HTTP client: {}", e)))?;
        let gateways = GatewayRegistry::from_config(&config, http);

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let http_port = listener.local_addr()?.port();

        tracing::info!(port = http_port, service = %config.service_name, "Storefront service bound");

        Ok(Self {
            http_port,
            listener,
            state: AppState::new(config, store, gateways),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = router(self.state);
        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Build the HTTP router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Catalog
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        // Cart
        .route(
            "/cart",
            get(handlers::cart::get_cart).post(handlers::cart::add_to_cart),
        )
        .route(
            "/cart/:id",
            axum::routing::put(handlers::cart::update_cart_item)
                .delete(handlers::cart::remove_cart_item),
        )
        // Orders
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::place_order),
        )
        .route(
            "/orders/:id",
            get(handlers::orders::get_order).delete(handlers::orders::delete_order),
        )
        .route("/orders/:id/pay", post(handlers::orders::pay_order))
        .route("/orders/:id/payment", post(handlers::orders::request_payment))
        // Gateway callbacks
        .route("/webhooks/stripe", post(handlers::webhooks::stripe_webhook))
        .route("/webhooks/payos", post(handlers::webhooks::payos_webhook))
        .route("/vnpay/return", get(handlers::webhooks::vnpay_return))
        .route("/vnpay/ipn", get(handlers::webhooks::vnpay_ipn))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

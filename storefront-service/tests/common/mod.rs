#![allow(dead_code)]

use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use storefront_service::config::{
    JwtConfig, PayosConfig, StorefrontConfig, StripeConfig, VnpayConfig,
};
use storefront_service::models::{NewProduct, Product};
use storefront_service::services::{MemoryStore, Store};
use storefront_service::startup::Application;
use uuid::Uuid;
use wiremock::MockServer;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const VNPAY_HASH_SECRET: &str = "VNPAYTESTSECRET";
pub const PAYOS_CHECKSUM_KEY: &str = "payos-checksum-key";

pub struct TestApp {
    pub address: String,
    pub http_port: u16,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
    /// Stands in for the Stripe and PayOS APIs.
    pub gateway_api: MockServer,
}

pub fn test_config(gateway_api: &str) -> StorefrontConfig {
    StorefrontConfig {
        common: CoreConfig {
            port: 0,
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        },
        service_name: "storefront-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        cors_allowed_origins: Vec::new(),
        database: None,
        jwt: JwtConfig {
            secret: Secret::new(JWT_SECRET.to_string()),
            issuer: None,
            audience: None,
        },
        gateway_timeout: Duration::from_secs(5),
        stripe: StripeConfig {
            secret_key: Some(Secret::new("sk_test_123".to_string())),
            webhook_secret: Some(Secret::new(STRIPE_WEBHOOK_SECRET.to_string())),
            api_base_url: gateway_api.to_string(),
            success_url: "https://shop.test/success?orderId={ORDER_ID}".to_string(),
            cancel_url: "https://shop.test/cancel?orderId={ORDER_ID}".to_string(),
            currency: "usd".to_string(),
            webhook_tolerance_secs: 300,
        },
        vnpay: VnpayConfig {
            tmn_code: "TESTTMN1".to_string(),
            hash_secret: Some(Secret::new(VNPAY_HASH_SECRET.to_string())),
            base_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "https://shop.test/vnpay/return".to_string(),
            locale: "vn".to_string(),
            expire_minutes: 15,
        },
        payos: PayosConfig {
            client_id: "payos-client".to_string(),
            api_key: Some(Secret::new("payos-api-key".to_string())),
            checksum_key: Some(Secret::new(PAYOS_CHECKSUM_KEY.to_string())),
            api_base_url: format!("{}/v2", gateway_api),
            return_url: "https://shop.test/payos/return".to_string(),
            cancel_url: "https://shop.test/payos/cancel".to_string(),
        },
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let gateway_api = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());

        let app = Application::build_with_store(test_config(&gateway_api.uri()), store.clone())
            .await
            .expect("Failed to build test application");

        let http_port = app.http_port();
        let address = format!("http://127.0.0.1:{}", http_port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            http_port,
            store,
            client,
            gateway_api,
        }
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        let claims = json!({
            "sub": user_id.to_string(),
            "exp": chrono::Utc::now().timestamp() + 3600,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to sign test token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn seed_product(&self, name: &str, price: &str) -> Product {
        self.store
            .create_product(&NewProduct {
                name: name.to_string(),
                description: format!("{} description", name),
                price: Decimal::from_str(price).expect("bad price"),
                image_url: None,
            })
            .await
            .expect("Failed to seed product")
    }

    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> reqwest::Response {
        self.client
            .post(self.url("/cart"))
            .bearer_auth(self.token_for(user_id))
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn place_order(&self, user_id: Uuid, payment_method: Option<&str>) -> reqwest::Response {
        self.client
            .post(self.url("/orders"))
            .bearer_auth(self.token_for(user_id))
            .json(&json!({ "payment_method": payment_method }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_authed(&self, user_id: Uuid, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(self.token_for(user_id))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Places a manual-payment order for one product and returns its id.
    pub async fn pending_order(&self, user_id: Uuid, price: &str, quantity: i32) -> Uuid {
        let product = self.seed_product("Test item", price).await;
        assert!(self
            .add_to_cart(user_id, product.product_id, quantity)
            .await
            .status()
            .is_success());
        let body: Value = self
            .place_order(user_id, None)
            .await
            .json()
            .await
            .expect("Failed to parse JSON");
        Uuid::parse_str(body["order"]["id"].as_str().expect("order id")).expect("uuid")
    }

    pub async fn order_status(&self, order_id: Uuid) -> String {
        self.store
            .get_order(order_id)
            .await
            .expect("store error")
            .expect("order missing")
            .status
            .to_string()
    }
}

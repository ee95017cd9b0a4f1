//! Configuration module for storefront-service.
//!
//! Each gateway gets its own struct so adapters receive exactly the
//! settings they need at construction time.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub gateway_timeout: Duration,
    pub stripe: StripeConfig,
    pub vnpay: VnpayConfig,
    pub payos: PayosConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<Secret<String>>,
    pub webhook_secret: Option<Secret<String>>,
    pub api_base_url: String,
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: Option<Secret<String>>,
    pub base_url: String,
    pub return_url: String,
    pub locale: String,
    pub expire_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct PayosConfig {
    pub client_id: String,
    pub api_key: Option<Secret<String>>,
    pub checksum_key: Option<Secret<String>>,
    pub api_base_url: String,
    pub return_url: String,
    pub cancel_url: String,
}

fn secret_var(name: &str) -> Option<Secret<String>> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(Secret::new)
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn string_var(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let jwt_secret = secret_var("JWT_SECRET")
            .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("JWT_SECRET is required")))?;

        let database = secret_var("DATABASE_URL").map(|url| DatabaseConfig {
            url,
            max_connections: parsed_var("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: parsed_var("DATABASE_MIN_CONNECTIONS", 2),
        });

        Ok(Self {
            service_name: string_var("SERVICE_NAME", "storefront-service"),
            log_level: string_var("LOG_LEVEL", &common.log_level),
            otlp_endpoint: env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| common.otlp_endpoint.clone()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            database,
            jwt: JwtConfig {
                secret: jwt_secret,
                issuer: env::var("JWT_ISSUER").ok().filter(|v| !v.is_empty()),
                audience: env::var("JWT_AUDIENCE").ok().filter(|v| !v.is_empty()),
            },
            gateway_timeout: Duration::from_secs(parsed_var("GATEWAY_TIMEOUT_SECS", 15)),
            stripe: StripeConfig {
                secret_key: secret_var("STRIPE_SECRET_KEY"),
                webhook_secret: secret_var("STRIPE_WEBHOOK_SECRET"),
                api_base_url: string_var("STRIPE_API_BASE_URL", "https://api.stripe.com"),
                success_url: string_var(
                    "STRIPE_SUCCESS_URL",
                    "https://example.com/success?orderId={ORDER_ID}",
                ),
                cancel_url: string_var(
                    "STRIPE_CANCEL_URL",
                    "https://example.com/cancel?orderId={ORDER_ID}",
                ),
                currency: string_var("STRIPE_CURRENCY", "usd"),
                webhook_tolerance_secs: parsed_var("STRIPE_WEBHOOK_TOLERANCE_SECS", 300),
            },
            vnpay: VnpayConfig {
                tmn_code: string_var("VNPAY_TMN_CODE", ""),
                hash_secret: secret_var("VNPAY_HASH_SECRET"),
                base_url: string_var(
                    "VNPAY_BASE_URL",
                    "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html",
                ),
                return_url: string_var("VNPAY_RETURN_URL", ""),
                locale: string_var("VNPAY_LOCALE", "vn"),
                expire_minutes: parsed_var("VNPAY_EXPIRE_MINUTES", 15),
            },
            payos: PayosConfig {
                client_id: string_var("PAYOS_CLIENT_ID", ""),
                api_key: secret_var("PAYOS_API_KEY"),
                checksum_key: secret_var("PAYOS_CHECKSUM_KEY"),
                api_base_url: string_var("PAYOS_API_BASE_URL", "https://api.payos.vn/v2"),
                return_url: string_var("PAYOS_RETURN_URL", ""),
                cancel_url: string_var("PAYOS_CANCEL_URL", ""),
            },
            common,
        })
    }
}

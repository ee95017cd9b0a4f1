//! VNPAY redirect adapter.
//!
//! Signing and transmission share one canonical string: parameters sorted
//! by key (ordinal), every key and value form-urlencoded (space as `+`),
//! joined with `&`. The HMAC-SHA512 of that string is appended as
//! `vnp_SecureHash`. Callbacks (browser return and IPN) are verified by
//! rebuilding the same string from the decoded query.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use service_core::utils::signature::{hmac_hex, verify_hex_signature, HmacAlgorithm};
use std::collections::BTreeMap;

use super::{scaled_amount, PaymentGateway};
use crate::config::VnpayConfig;
use crate::error::GatewayError;
use crate::models::payment::parse_order_reference;
use crate::models::{
    CallbackOutcome, CallbackRequest, Order, PaymentCallback, PaymentContext, PaymentDirective,
    PaymentMethod,
};

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

const VERSION: &str = "2.1.0";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Response codes VNPAY uses for a customer cancel (24) and an expired
/// payment window (11).
const FAILURE_RESPONSE_CODES: [&str; 2] = ["24", "11"];

#[derive(Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
}

/// Canonical `k=v&k=v` form of `params`.
pub fn canonical_query(params: &BTreeMap<String, String>) -> Result<String, GatewayError> {
    serde_urlencoded::to_string(params)
        .map_err(|e| GatewayError::MalformedPayload(format!("cannot encode parameters: {}", e)))
}

/// Vietnam local time (UTC+7, no DST) in VNPAY's date format.
fn vietnam_time(at: DateTime<Utc>) -> String {
    (at + Duration::hours(7)).format(DATE_FORMAT).to_string()
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    fn hash_secret(&self) -> Result<&str, GatewayError> {
        self.config
            .hash_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .ok_or(GatewayError::NotConfigured)
    }

    fn payment_params(
        &self,
        order: &Order,
        ctx: &PaymentContext,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, String>, GatewayError> {
        let expire = now + Duration::minutes(self.config.expire_minutes);
        let params = [
            ("vnp_Version", VERSION.to_string()),
            ("vnp_Command", "pay".to_string()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Amount", scaled_amount(order.total_amount, 100)?.to_string()),
            ("vnp_CreateDate", vietnam_time(now)),
            ("vnp_ExpireDate", vietnam_time(expire)),
            ("vnp_CurrCode", "VND".to_string()),
            ("vnp_IpAddr", ctx.client_ip.to_string()),
            ("vnp_Locale", self.config.locale.clone()),
            (
                "vnp_OrderInfo",
                format!("Thanh toan don hang {}", order.order_id),
            ),
            ("vnp_OrderType", "other".to_string()),
            ("vnp_ReturnUrl", self.config.return_url.clone()),
            ("vnp_TxnRef", order.reference()),
        ];

        Ok(params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect())
    }

    /// Full payment URL for `order` created at `now`.
    pub fn payment_url(
        &self,
        order: &Order,
        ctx: &PaymentContext,
        now: DateTime<Utc>,
    ) -> Result<String, GatewayError> {
        let secret = self.hash_secret()?;
        let query = canonical_query(&self.payment_params(order, ctx, now)?)?;
        let secure_hash = hmac_hex(secret, &query, HmacAlgorithm::Sha512)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        Ok(format!(
            "{}?{}&{}={}",
            self.config.base_url, query, SECURE_HASH, secure_hash
        ))
    }
}

#[async_trait]
impl PaymentGateway for VnpayGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Vnpay
    }

    fn is_configured(&self) -> bool {
        self.config.hash_secret.is_some() && !self.config.tmn_code.is_empty()
    }

    async fn build_payment_request(
        &self,
        order: &Order,
        ctx: &PaymentContext,
    ) -> Result<PaymentDirective, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let url = self.payment_url(order, ctx, Utc::now())?;

        tracing::info!(order_id = %order.order_id, "VNPAY payment url created");

        Ok(PaymentDirective::Redirect {
            gateway: PaymentMethod::Vnpay,
            url,
            reference: Some(order.reference()),
        })
    }

    async fn verify_callback(
        &self,
        request: &CallbackRequest,
    ) -> Result<PaymentCallback, GatewayError> {
        let secret = self.hash_secret()?;

        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&request.query)
            .map_err(|_| GatewayError::InvalidSignature("undecodable query string".into()))?;

        let mut params: BTreeMap<String, String> = pairs
            .into_iter()
            .filter(|(k, _)| k.starts_with("vnp_"))
            .collect();

        let provided = params
            .remove(SECURE_HASH)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::InvalidSignature("missing vnp_SecureHash".into()))?;
        params.remove(SECURE_HASH_TYPE);

        let signed = canonical_query(&params)?;
        if !verify_hex_signature(secret, &signed, HmacAlgorithm::Sha512, &provided) {
            return Err(GatewayError::InvalidSignature(
                "vnp_SecureHash mismatch".into(),
            ));
        }

        let transaction_status = params.get("vnp_TransactionStatus").map(String::as_str);
        let response_code = params.get("vnp_ResponseCode").map(String::as_str);
        let outcome = if transaction_status == Some("00") {
            CallbackOutcome::Paid
        } else if response_code.is_some_and(|c| FAILURE_RESPONSE_CODES.contains(&c)) {
            CallbackOutcome::Failed
        } else {
            CallbackOutcome::Unknown
        };

        let txn_ref = params.get("vnp_TxnRef").cloned();

        tracing::info!(
            txn_ref = txn_ref.as_deref().unwrap_or("-"),
            transaction_status = transaction_status.unwrap_or("-"),
            response_code = response_code.unwrap_or("-"),
            outcome = outcome.as_str(),
            "VNPAY callback verified"
        );

        Ok(PaymentCallback {
            gateway: PaymentMethod::Vnpay,
            order_id: txn_ref.as_deref().and_then(parse_order_reference),
            outcome,
            signature: provided,
            payload: serde_json::to_value(&params).unwrap_or_default(),
        })
    }
}

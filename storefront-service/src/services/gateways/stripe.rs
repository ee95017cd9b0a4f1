//! Stripe Checkout adapter.
//!
//! Payment starts with a Checkout Session created over Stripe's form API;
//! completion arrives as a signed webhook event.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::utils::signature::{verify_hex_signature, HmacAlgorithm};

use super::{header_value, scaled_amount, PaymentGateway};
use crate::config::StripeConfig;
use crate::error::GatewayError;
use crate::models::payment::parse_order_reference;
use crate::models::{
    CallbackOutcome, CallbackRequest, Order, PaymentCallback, PaymentContext, PaymentDirective,
    PaymentMethod,
};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`.
#[derive(Debug, PartialEq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Option<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=')?;
            match key {
                "t" => timestamp = value.parse::<i64>().ok(),
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }
        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Some(Self {
                timestamp,
                signatures,
            }),
            _ => None,
        }
    }
}

impl StripeGateway {
    pub fn new(config: StripeConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Form parameters for a Checkout Session paying `order`.
    fn session_params(&self, order: &Order) -> Result<Vec<(String, String)>, GatewayError> {
        let order_id = order.order_id.to_string();
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "success_url".to_string(),
                self.config.success_url.replace("{ORDER_ID}", &order_id),
            ),
            (
                "cancel_url".to_string(),
                self.config.cancel_url.replace("{ORDER_ID}", &order_id),
            ),
            ("client_reference_id".to_string(), order_id.clone()),
            ("metadata[orderId]".to_string(), order_id.clone()),
            (
                "payment_intent_data[metadata][orderId]".to_string(),
                order_id,
            ),
        ];

        for (i, item) in order.items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            params.push((
                format!("{prefix}[price_data][currency]"),
                self.config.currency.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                scaled_amount(item.unit_price, 100)?.to_string(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.product_id.to_string(),
            ));
        }

        Ok(params)
    }

    /// Checks the signature header against `payload` at time `now`.
    fn verify_signature(
        &self,
        secret: &str,
        header: &str,
        payload: &[u8],
        now: i64,
    ) -> Result<(), GatewayError> {
        let header = SignatureHeader::parse(header)
            .ok_or_else(|| GatewayError::InvalidSignature("malformed Stripe-Signature".into()))?;

        // `t` is caller-supplied and may sit anywhere in the i64 range.
        let skew = now.abs_diff(header.timestamp);
        if skew > self.config.webhook_tolerance_secs.unsigned_abs() {
            return Err(GatewayError::InvalidSignature(format!(
                "timestamp outside tolerance ({}s)",
                skew
            )));
        }

        let payload = std::str::from_utf8(payload)
            .map_err(|_| GatewayError::InvalidSignature("payload is not utf-8".into()))?;
        let signed_payload = format!("{}.{}", header.timestamp, payload);

        if header
            .signatures
            .iter()
            .any(|sig| verify_hex_signature(secret, &signed_payload, HmacAlgorithm::Sha256, sig))
        {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature("no matching v1 signature".into()))
        }
    }

    fn verify_at(
        &self,
        request: &CallbackRequest,
        now: i64,
    ) -> Result<PaymentCallback, GatewayError> {
        let secret = self
            .config
            .webhook_secret
            .as_ref()
            .ok_or(GatewayError::NotConfigured)?;
        let header = header_value(request, SIGNATURE_HEADER)
            .ok_or_else(|| GatewayError::InvalidSignature("missing Stripe-Signature".into()))?;

        self.verify_signature(secret.expose_secret(), &header, &request.body, now)?;

        let event: StripeEvent = serde_json::from_slice(&request.body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let object = &event.data.object;
        let (order_ref, outcome) = match event.event_type.as_str() {
            "checkout.session.completed" => (
                object.get("client_reference_id").and_then(|v| v.as_str()),
                CallbackOutcome::Paid,
            ),
            "payment_intent.succeeded" => (
                object
                    .get("metadata")
                    .and_then(|m| m.get("orderId"))
                    .and_then(|v| v.as_str()),
                CallbackOutcome::Paid,
            ),
            "checkout.session.expired" => (
                object.get("client_reference_id").and_then(|v| v.as_str()),
                CallbackOutcome::Failed,
            ),
            _ => (None, CallbackOutcome::Unknown),
        };

        tracing::info!(
            event_type = %event.event_type,
            order_ref = order_ref.unwrap_or("-"),
            "Stripe webhook verified"
        );

        Ok(PaymentCallback {
            gateway: PaymentMethod::Stripe,
            order_id: order_ref.and_then(parse_order_reference),
            outcome,
            signature: header,
            payload: object.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Stripe
    }

    fn is_configured(&self) -> bool {
        self.config.secret_key.is_some() && self.config.webhook_secret.is_some()
    }

    async fn build_payment_request(
        &self,
        order: &Order,
        _ctx: &PaymentContext,
    ) -> Result<PaymentDirective, GatewayError> {
        let secret_key = self
            .config
            .secret_key
            .as_ref()
            .ok_or(GatewayError::NotConfigured)?;

        let params = self.session_params(order)?;
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(secret_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, order_id = %order.order_id, "Stripe create session response");

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::error!(
                status = %status,
                order_id = %order.order_id,
                error = %message,
                "Stripe checkout session creation failed"
            );
            return Err(GatewayError::Upstream(format!("Stripe API error: {}", message)));
        }

        let session: CheckoutSession = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Upstream(format!("Invalid Stripe response: {}", e)))?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::Upstream("Stripe session has no url".into()))?;

        tracing::info!(
            order_id = %order.order_id,
            session_id = %session.id,
            "Stripe checkout session created"
        );

        Ok(PaymentDirective::Redirect {
            gateway: PaymentMethod::Stripe,
            url,
            reference: Some(session.id),
        })
    }

    async fn verify_callback(
        &self,
        request: &CallbackRequest,
    ) -> Result<PaymentCallback, GatewayError> {
        self.verify_at(request, chrono::Utc::now().timestamp())
    }
}

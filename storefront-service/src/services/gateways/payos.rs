//! PayOS payment-link adapter.
//!
//! Webhooks are signed with the checksum key. Depending on integration
//! version PayOS signs the raw body, the raw `data` object, or a sorted
//! `k=v&...` rendering of `data`; any of the three is accepted.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use service_core::utils::signature::{hmac_hex, verify_hex_signature, HmacAlgorithm};

use super::{header_value, scaled_amount, PaymentGateway};
use crate::config::PayosConfig;
use crate::error::GatewayError;
use crate::models::payment::parse_order_reference;
use crate::models::{
    CallbackOutcome, CallbackRequest, Order, PaymentCallback, PaymentContext, PaymentDirective,
    PaymentMethod,
};

pub const SIGNATURE_HEADER: &str = "x-payos-signature";

#[derive(Clone)]
pub struct PayosGateway {
    client: reqwest::Client,
    config: PayosConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest {
    order_code: String,
    amount: i64,
    description: String,
    return_url: String,
    cancel_url: String,
    signature: String,
}

/// Borrowed view of a webhook body, used to pull out the exact `data`
/// bytes the provider may have signed.
#[derive(Deserialize)]
struct RawEnvelope<'a> {
    #[serde(borrow, default)]
    data: Option<&'a RawValue>,
    #[serde(default)]
    signature: Option<String>,
}

/// PayOS' canonical rendering of an object: keys sorted, `k=v` joined by
/// `&`, nulls as empty strings, nested values as compact JSON.
pub fn canonical_data(data: &serde_json::Map<String, Value>) -> String {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| {
            let value = match &data[k] {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", k, value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Looks `key` up in `data` first, then at the root.
fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    root.get("data")
        .and_then(|d| d.get(key))
        .filter(|v| !v.is_null())
        .or_else(|| root.get(key).filter(|v| !v.is_null()))
}

/// String or number rendered as text.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn outcome_of(root: &Value) -> CallbackOutcome {
    if let Some(status) = lookup(root, "status").and_then(as_text) {
        return match status.to_ascii_uppercase().as_str() {
            "PAID" => CallbackOutcome::Paid,
            "CANCELLED" | "FAILED" | "EXPIRED" => CallbackOutcome::Failed,
            _ => CallbackOutcome::Unknown,
        };
    }
    match lookup(root, "code").and_then(as_text).as_deref() {
        Some("00") => CallbackOutcome::Paid,
        _ => CallbackOutcome::Unknown,
    }
}

impl PayosGateway {
    pub fn new(config: PayosConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn checksum_key(&self) -> Result<&str, GatewayError> {
        self.config
            .checksum_key
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .ok_or(GatewayError::NotConfigured)
    }

    fn payment_request(&self, order: &Order) -> Result<CreatePaymentRequest, GatewayError> {
        let amount = scaled_amount(order.total_amount, 1)?;
        let order_code = order.reference();
        let description = format!("Order {}", order.order_id);

        let signed = format!(
            "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
            amount, self.config.cancel_url, description, order_code, self.config.return_url
        );
        let signature = hmac_hex(self.checksum_key()?, &signed, HmacAlgorithm::Sha256)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        Ok(CreatePaymentRequest {
            order_code,
            amount,
            description,
            return_url: self.config.return_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
            signature,
        })
    }

    /// Every byte string the signature may legitimately cover.
    fn signed_candidates(body: &str) -> Vec<String> {
        let mut candidates = vec![body.to_string()];
        if let Ok(envelope) = serde_json::from_str::<RawEnvelope>(body) {
            if let Some(raw) = envelope.data {
                candidates.push(raw.get().to_string());
                if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.get()) {
                    candidates.push(canonical_data(&map));
                }
            }
        }
        candidates
    }
}

#[async_trait]
impl PaymentGateway for PayosGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Payos
    }

    fn is_configured(&self) -> bool {
        !self.config.client_id.is_empty()
            && self.config.api_key.is_some()
            && self.config.checksum_key.is_some()
    }

    async fn build_payment_request(
        &self,
        order: &Order,
        _ctx: &PaymentContext,
    ) -> Result<PaymentDirective, GatewayError> {
        let api_key = match (&self.config.api_key, self.is_configured()) {
            (Some(key), true) => key,
            _ => return Err(GatewayError::NotConfigured),
        };

        let request = self.payment_request(order)?;
        let url = format!("{}/payment-requests", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, order_id = %order.order_id, "PayOS create payment response");

        if !status.is_success() {
            tracing::error!(
                status = %status,
                order_id = %order.order_id,
                body = %body,
                "PayOS payment request failed"
            );
            return Err(GatewayError::Upstream(format!(
                "PayOS API error: HTTP {}",
                status.as_u16()
            )));
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Upstream(format!("Invalid PayOS response: {}", e)))?;

        tracing::info!(order_id = %order.order_id, "PayOS payment link created");

        Ok(PaymentDirective::PaymentLink {
            gateway: PaymentMethod::Payos,
            payload,
        })
    }

    async fn verify_callback(
        &self,
        request: &CallbackRequest,
    ) -> Result<PaymentCallback, GatewayError> {
        let key = self.checksum_key()?;
        let body = std::str::from_utf8(&request.body)
            .map_err(|_| GatewayError::InvalidSignature("body is not utf-8".into()))?;

        let signature = header_value(request, SIGNATURE_HEADER)
            .or_else(|| {
                serde_json::from_str::<RawEnvelope>(body)
                    .ok()
                    .and_then(|e| e.signature)
                    .filter(|s| !s.trim().is_empty())
            })
            .ok_or_else(|| GatewayError::InvalidSignature("missing signature".into()))?;

        let verified = Self::signed_candidates(body)
            .iter()
            .any(|candidate| verify_hex_signature(key, candidate, HmacAlgorithm::Sha256, &signature));
        if !verified {
            return Err(GatewayError::InvalidSignature("signature mismatch".into()));
        }

        let root: Value = serde_json::from_str(body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let order_code = lookup(&root, "orderCode").and_then(as_text);
        let outcome = outcome_of(&root);

        tracing::info!(
            order_code = order_code.as_deref().unwrap_or("-"),
            outcome = outcome.as_str(),
            "PayOS webhook verified"
        );

        Ok(PaymentCallback {
            gateway: PaymentMethod::Payos,
            order_id: order_code.as_deref().and_then(parse_order_reference),
            outcome,
            signature,
            payload: root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use secrecy::Secret;
    use uuid::Uuid;

    const CHECKSUM: &str = "payos-checksum";

    fn gateway() -> PayosGateway {
        PayosGateway::new(
            PayosConfig {
                client_id: "client".into(),
                api_key: Some(Secret::new("api".into())),
                checksum_key: Some(Secret::new(CHECKSUM.into())),
                api_base_url: "http://localhost".into(),
                return_url: "https://shop.test/return".into(),
                cancel_url: "https://shop.test/cancel".into(),
            },
            reqwest::Client::new(),
        )
    }

    fn with_header(body: &str, signature: &str) -> CallbackRequest {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        CallbackRequest {
            body: body.as_bytes().to_vec(),
            headers,
            query: String::new(),
        }
    }

    fn sign(message: &str) -> String {
        hmac_hex(CHECKSUM, message, HmacAlgorithm::Sha256).unwrap()
    }

    #[tokio::test]
    async fn test_signature_over_raw_body() {
        let id = Uuid::new_v4();
        let body = format!(r#"{{"code":"00","data":{{"orderCode":"{}","code":"00"}}}}"#, id.simple());
        let cb = gateway()
            .verify_callback(&with_header(&body, &sign(&body)))
            .await
            .unwrap();
        assert_eq!(cb.order_id, Some(id));
        assert_eq!(cb.outcome, CallbackOutcome::Paid);
    }

    #[tokio::test]
    async fn test_signature_over_raw_data() {
        let id = Uuid::new_v4();
        let data = format!(r#"{{"orderCode": "{}", "status": "PAID"}}"#, id.simple());
        let body = format!(r#"{{"code":"00","data": {}}}"#, data);
        let cb = gateway()
            .verify_callback(&with_header(&body, &sign(&data)))
            .await
            .unwrap();
        assert_eq!(cb.outcome, CallbackOutcome::Paid);
    }

    #[tokio::test]
    async fn test_signature_over_canonical_data_in_body_field() {
        let id = Uuid::new_v4();
        let canonical = format!(
            "amount=25000&code=00&desc=success&orderCode={}&reference=",
            id.simple()
        );
        let body = format!(
            r#"{{"data":{{"orderCode":"{}","amount":25000,"desc":"success","code":"00","reference":null}},"signature":"{}"}}"#,
            id.simple(),
            sign(&canonical)
        );
        let request = CallbackRequest {
            body: body.into_bytes(),
            ..Default::default()
        };
        let cb = gateway().verify_callback(&request).await.unwrap();
        assert_eq!(cb.order_id, Some(id));
        assert_eq!(cb.outcome, CallbackOutcome::Paid);
    }

    #[tokio::test]
    async fn test_tampered_body_is_rejected() {
        let body = r#"{"data":{"orderCode":"abc","status":"PAID"}}"#;
        let sig = sign(body);
        let tampered = body.replace("PAID", "PAID ");
        let err = gateway()
            .verify_callback(&with_header(&tampered, &sig))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let request = CallbackRequest {
            body: br#"{"data":{"status":"PAID"}}"#.to_vec(),
            ..Default::default()
        };
        let err = gateway().verify_callback(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn test_outcome_mapping() {
        let cases = [
            (r#"{"data":{"status":"paid"}}"#, CallbackOutcome::Paid),
            (r#"{"data":{"status":"CANCELLED"}}"#, CallbackOutcome::Failed),
            (r#"{"status":"EXPIRED"}"#, CallbackOutcome::Failed),
            (r#"{"data":{"status":"PENDING","code":"00"}}"#, CallbackOutcome::Unknown),
            (r#"{"code":"00"}"#, CallbackOutcome::Paid),
            (r#"{"data":{"code":"01"}}"#, CallbackOutcome::Unknown),
        ];
        for (body, expected) in cases {
            let root: Value = serde_json::from_str(body).unwrap();
            assert_eq!(outcome_of(&root), expected, "{}", body);
        }
    }

    #[test]
    fn test_numeric_order_code_is_read_as_text() {
        let root: Value = serde_json::from_str(r#"{"orderCode":123,"data":{}}"#).unwrap();
        assert_eq!(lookup(&root, "orderCode").and_then(as_text), Some("123".into()));
    }

    #[test]
    fn test_payment_request_signature() {
        let order_id = Uuid::new_v4();
        let order = Order {
            order_id,
            user_id: Uuid::new_v4(),
            total_amount: "25000.40".parse().unwrap(),
            status: crate::models::OrderStatus::Pending,
            created_utc: chrono::Utc::now(),
            updated_utc: chrono::Utc::now(),
            items: vec![],
        };
        let req = gateway().payment_request(&order).unwrap();
        assert_eq!(req.amount, 25000);
        assert_eq!(req.order_code, order_id.simple().to_string());

        let expected = sign(&format!(
            "amount=25000&cancelUrl=https://shop.test/cancel&description=Order {}&orderCode={}&returnUrl=https://shop.test/return",
            order_id,
            order_id.simple()
        ));
        assert_eq!(req.signature, expected);
    }
}

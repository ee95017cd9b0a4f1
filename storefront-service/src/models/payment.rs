//! Gateway-facing types shared by every adapter.

use axum::http::HeaderMap;
use serde::Serialize;
use std::net::IpAddr;
use uuid::Uuid;

use super::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Vnpay,
    Payos,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::Stripe, Self::Vnpay, Self::Payos];

    /// Case-insensitive. Anything unrecognised is the manual payment path.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stripe" => Some(Self::Stripe),
            "vnpay" => Some(Self::Vnpay),
            "payos" => Some(Self::Payos),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Vnpay => "vnpay",
            Self::Payos => "payos",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request-scoped details some gateways embed in the payment request.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    pub client_ip: IpAddr,
}

impl Default for PaymentContext {
    fn default() -> Self {
        Self {
            client_ip: IpAddr::from([127, 0, 0, 1]),
        }
    }
}

/// What the client should do next to pay.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentDirective {
    Redirect {
        gateway: PaymentMethod,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    PaymentLink {
        gateway: PaymentMethod,
        payload: serde_json::Value,
    },
}

/// An inbound gateway callback exactly as received.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    pub body: Vec<u8>,
    pub headers: HeaderMap,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackOutcome {
    Paid,
    Failed,
    Unknown,
}

impl CallbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Status to apply, if the outcome is decisive.
    pub fn target_status(&self) -> Option<OrderStatus> {
        match self {
            Self::Paid => Some(OrderStatus::Paid),
            Self::Failed => Some(OrderStatus::Failed),
            Self::Unknown => None,
        }
    }
}

/// A callback whose signature has been verified.
#[derive(Debug, Clone)]
pub struct PaymentCallback {
    pub gateway: PaymentMethod,
    pub order_id: Option<Uuid>,
    pub outcome: CallbackOutcome,
    pub signature: String,
    pub payload: serde_json::Value,
}

/// Gateways echo the order id as 32 hex digits or hyphenated; both parse.
pub fn parse_order_reference(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_case_insensitive() {
        assert_eq!(PaymentMethod::parse("PayOS"), Some(PaymentMethod::Payos));
        assert_eq!(PaymentMethod::parse(" VNPAY "), Some(PaymentMethod::Vnpay));
        assert_eq!(PaymentMethod::parse("Stripe"), Some(PaymentMethod::Stripe));
        assert_eq!(PaymentMethod::parse("cod"), None);
        assert_eq!(PaymentMethod::parse(""), None);
    }

    #[test]
    fn test_order_reference_accepts_both_forms() {
        let id = Uuid::new_v4();
        assert_eq!(parse_order_reference(&id.simple().to_string()), Some(id));
        assert_eq!(parse_order_reference(&id.to_string()), Some(id));
        assert_eq!(parse_order_reference("12345"), None);
    }

    #[test]
    fn test_directive_serializes_tagged() {
        let d = PaymentDirective::Redirect {
            gateway: PaymentMethod::Vnpay,
            url: "https://pay.example/x".to_string(),
            reference: None,
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["type"], "redirect");
        assert_eq!(v["gateway"], "vnpay");
        assert!(v.get("reference").is_none());
    }
}

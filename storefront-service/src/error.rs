//! Domain errors raised below the HTTP boundary.

use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product with ID {0} is no longer available")]
    ProductUnavailable(Uuid),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => AppError::BadRequest(anyhow::Error::new(err)),
            CheckoutError::ProductUnavailable(_) => AppError::NotFound(anyhow::Error::new(err)),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("gateway not configured")]
    NotConfigured,

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature(reason) => AppError::InvalidSignature(reason),
            // Parser output can quote the payload; the detail is logged instead.
            GatewayError::MalformedPayload(_) => AppError::BadRequest(anyhow::anyhow!("Bad request")),
            GatewayError::NotConfigured => AppError::ServiceUnavailable,
            GatewayError::Upstream(msg) => AppError::BadGateway(msg),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Upstream("request timed out".to_string())
        } else {
            GatewayError::Upstream(err.to_string())
        }
    }
}

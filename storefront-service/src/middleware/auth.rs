//! Bearer-token identity for customer endpoints.
//!
//! Tokens are issued by the external identity service; this side only
//! verifies them and extracts the user id from `sub`.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(
                config.secret.expose_secret().as_bytes(),
            )),
            validation,
        }
    }

    /// Validates signature and expiry, returning the subject as a user id.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Token subject is not a user id")))
    }
}

/// The authenticated caller's user id.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
            })?;

        let user_id = state.verifier.verify(token.trim()).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
        })?;

        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use secrecy::Secret;

    fn config(issuer: Option<&str>) -> JwtConfig {
        JwtConfig {
            secret: Secret::new("test-secret".into()),
            issuer: issuer.map(String::from),
            audience: None,
        }
    }

    fn token(secret: &str, sub: &str, iss: Option<&str>, exp_offset: i64) -> String {
        let claims = Claims {
            sub: sub.into(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
            iss: iss.map(String::from),
            aud: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_accepts_valid_token() {
        let user = Uuid::new_v4();
        let verifier = TokenVerifier::new(&config(None));
        let t = token("test-secret", &user.to_string(), None, 3600);
        assert_eq!(verifier.verify(&t).unwrap(), user);
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        let user = Uuid::new_v4().to_string();
        let verifier = TokenVerifier::new(&config(Some("identity")));

        assert!(verifier
            .verify(&token("other-secret", &user, Some("identity"), 3600))
            .is_err());
        assert!(verifier
            .verify(&token("test-secret", &user, Some("identity"), -3600))
            .is_err());
        assert!(verifier
            .verify(&token("test-secret", &user, Some("someone-else"), 3600))
            .is_err());
        assert!(verifier
            .verify(&token("test-secret", "not-a-uuid", Some("identity"), 3600))
            .is_err());
        assert!(verifier
            .verify(&token("test-secret", &user, Some("identity"), 3600))
            .is_ok());
    }
}

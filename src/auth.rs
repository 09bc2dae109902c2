//! Bearer-token authentication. Tokens are HS256 JWTs issued by the
//! identity service; this crate only verifies them and exposes the
//! caller's identity to handlers via the [`AuthUser`] extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Merchant,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub role: Role,
    /// Merchant verification tier, present for merchant tokens
    #[serde(default)]
    pub verification_level: Option<String>,
    pub exp: usize,
}

/// Authenticated caller, extracted from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Merchants and admins may manage inventory and bookings.
    pub fn require_merchant(&self) -> Result<(), ServiceError> {
        match self.role {
            Role::Merchant | Role::Admin => Ok(()),
            Role::Guest => Err(ServiceError::Forbidden(
                "Merchant role required".to_string(),
            )),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("Missing Authorization header".to_string())
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("Expected a Bearer token".to_string())
        })?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(AuthUser {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn claims_round_trip() {
        let secret = "unit-test-secret";
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Merchant,
            verification_level: Some("verified".to_string()),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };

        let token = token(&claims, secret);
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, claims.sub);
        assert_eq!(decoded.claims.role, Role::Merchant);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Guest,
            verification_level: None,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = token(&claims, "secret-a");
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret-b"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn guests_cannot_act_as_merchants() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Guest,
        };
        assert!(matches!(
            user.require_merchant(),
            Err(ServiceError::Forbidden(_))
        ));

        let merchant = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Merchant,
        };
        assert!(merchant.require_merchant().is_ok());
    }
}

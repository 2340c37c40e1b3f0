use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::UserRole,
    error::{AppError, Result},
};

/// Bearer token claims. Tokens are issued by the identity service; this
/// crate only needs the subject and role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_hours: i64,
}

impl AuthService {
    pub fn new(secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl_hours,
        }
    }

    /// Signs an HS256 token. Used by the seed tool and tests.
    pub fn issue_token(&self, user_id: Uuid, role: UserRole) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_ttl_hours)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected bearer token: {}", e);
                AppError::Unauthorized
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_validates() {
        let auth = AuthService::new("secret", 1);
        let user_id = Uuid::new_v4();
        let token = auth.issue_token(user_id, UserRole::Admin).unwrap();

        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_foreign_token_is_rejected() {
        let issuer = AuthService::new("secret-a", 1);
        let verifier = AuthService::new("secret-b", 1);
        let token = issuer.issue_token(Uuid::new_v4(), UserRole::User).unwrap();

        assert!(matches!(verifier.validate_token(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = AuthService::new("secret", -2);
        let token = auth.issue_token(Uuid::new_v4(), UserRole::User).unwrap();

        assert!(matches!(auth.validate_token(&token), Err(AppError::Unauthorized)));
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the authenticated user id.
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 bearer-token codec. Verification is the server-side half of the
/// authentication boundary; issuance exists for tooling and tests.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue_with_ttl(user_id, Duration::hours(DEFAULT_TOKEN_TTL_HOURS))
    }

    pub fn issue_with_ttl(&self, user_id: Uuid, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let service = JwtService::new("test-secret");
        let user_id = Uuid::new_v4();

        let token = service.issue(user_id).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let issuer = JwtService::new("secret-a");
        let verifier = JwtService::new("secret-b");

        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new("test-secret");
        let token = service
            .issue_with_ttl(Uuid::new_v4(), Duration::hours(-1))
            .unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let service = JwtService::new("test-secret");
        assert!(matches!(
            service.verify("not-a-token"),
            Err(TokenError::Invalid)
        ));
    }
}

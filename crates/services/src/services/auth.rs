use db::{DBService, DbErr, models::user::User};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utils_jwt::{JwtService, TokenError};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Authentication error: No token provided")]
    MissingToken,
    #[error("Authentication error: Invalid token")]
    InvalidToken,
    #[error("Authentication error: Token expired")]
    TokenExpired,
}

/// Authenticated identity attached to a request or connection. Never carries
/// credentials or internal row ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Token verification boundary: a bearer token resolves to an active user
/// record or the request dies here.
#[derive(Clone)]
pub struct AuthService {
    db: DBService,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(db: DBService, jwt: JwtService) -> Self {
        Self { db, jwt }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.jwt.verify(token).map_err(|err| match err {
            TokenError::Expired => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        let user = User::find_by_id(&self.db.pool, claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::InvalidToken);
        }

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}

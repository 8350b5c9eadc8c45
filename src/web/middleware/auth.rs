//! JWT authentication middleware for system users.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::datetime::now_unix;
use crate::db::User;
use crate::web::error::ApiError;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    /// Username.
    pub username: String,
    /// User role.
    pub role: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID (unique identifier).
    pub jti: String,
}

/// Keys and settings for issuing and checking access tokens.
#[derive(Clone)]
pub struct JwtState {
    encoding_key: EncodingKey,
    /// Decoding key for JWT verification.
    pub decoding_key: DecodingKey,
    /// Validation settings.
    pub validation: Validation,
    /// Access token lifetime in seconds.
    pub access_token_expiry: u64,
}

impl JwtState {
    /// Create a new JWT state from a secret key.
    pub fn new(secret: &str, access_token_expiry: u64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_token_expiry,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let now = now_unix().max(0) as u64;
        let claims = JwtClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to encode JWT");
            ApiError::internal("Failed to generate token")
        })
    }

    /// Decode and validate a token.
    pub fn verify(&self, token: &str) -> Option<JwtClaims> {
        match decode::<JwtClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "JWT validation failed");
                None
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

/// Extractor for authenticated users.
///
/// The handler receives the JWT claims if the token is valid. Whether the
/// user still exists and is active is checked by the handler.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

        // Set by the jwt_auth middleware.
        let jwt_state = parts
            .extensions
            .get::<Arc<JwtState>>()
            .ok_or_else(|| ApiError::internal("JWT state not configured"))?;

        jwt_state
            .verify(token)
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
    }
}

/// Optional authentication extractor.
///
/// Similar to AuthUser but yields `None` instead of failing when the token is
/// missing or invalid.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<JwtClaims>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = match (bearer_token(parts), parts.extensions.get::<Arc<JwtState>>()) {
            (Some(token), Some(jwt_state)) => jwt_state.verify(token),
            _ => None,
        };
        Ok(OptionalAuthUser(claims))
    }
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;

    fn user() -> User {
        User {
            id: 1,
            username: "testuser".to_string(),
            password: "hash".to_string(),
            email: None,
            role: Role::User,
            is_active: true,
            created_at: 0,
        }
    }

    #[test]
    fn test_jwt_state_new() {
        let state = JwtState::new("test-secret", 900);
        assert!(state.validation.validate_exp);
        assert_eq!(state.access_token_expiry, 900);
    }

    #[test]
    fn test_create_and_verify_token() {
        let state = JwtState::new("test-secret", 3600);
        let token = state.generate_access_token(&user()).unwrap();

        let claims = state.verify(&token).unwrap();
        assert_eq!(claims.sub, 1);
        assert_eq!(claims.username, "testuser");
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn test_expired_token() {
        let state = JwtState::new("test-secret", 3600);
        let now = now_unix() as u64;
        let claims = JwtClaims {
            sub: 1,
            username: "testuser".to_string(),
            role: "user".to_string(),
            iat: now - 7200,
            exp: now - 3600, // Expired 1 hour ago
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(state.verify(&token).is_none());
    }

    #[test]
    fn test_invalid_secret() {
        let token = JwtState::new("secret1", 3600)
            .generate_access_token(&user())
            .unwrap();
        assert!(JwtState::new("secret2", 3600).verify(&token).is_none());
    }
}

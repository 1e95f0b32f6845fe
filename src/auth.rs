use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Role, User},
    policy::Viewer,
};

/// Lifetime of an issued session token.
const TOKEN_TTL_HOURS: i64 = 24;

/// Claims
///
/// Payload of a session token. Signed with the configured secret (HS256) and validated on
/// every authenticated request. Handlers read the caller's identity from these claims only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub user_id: i64,
    /// Role at login time. The content service re-reads the stored role.
    pub role: Role,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp): `iat` + 24h.
    pub exp: usize,
    /// JWT ID: unique per issued token.
    pub jti: Uuid,
}

/// TokenService
///
/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret)
    }

    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            username: user.username.clone(),
            user_id: user.id,
            role: user.role,
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
            jti: Uuid::new_v4(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        // Ensure expiration time validation is always active.
        validation.validate_exp = true;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthenticated("token expired".to_string()),
                _ => AppError::Unauthenticated("invalid token".to_string()),
            })
    }
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request, taken from verified claims.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// The caller as seen by the policy engine, with the role carried in the token.
    pub fn viewer(&self) -> Viewer {
        Viewer::new(self.username.clone(), self.role)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. Extraction fails with
/// `AppError::Unauthenticated` (401) when the `Authorization: Bearer <token>` header is
/// missing or malformed, or when the token fails verification.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = TokenService::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("expected a bearer token".to_string()))?;

        let claims = tokens.verify(token).inspect_err(|e| {
            tracing::debug!("rejected session token: {}", e);
        })?;

        Ok(claims.into())
    }
}

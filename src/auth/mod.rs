/*!
 * # Authentication Module
 *
 * Session authentication for the wholesaler API:
 *
 * - Argon2id password hashing (PHC strings stored per user)
 * - HS256 session tokens carrying a `jti` session id
 * - In-memory revocation list consulted on every validation
 * - A router guard that bounces anonymous requests to `/login`
 *
 * The `jti` doubles as the key for the session's cart, so revoking a
 * session also cuts the cart loose.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user;

/// Claim structure for session tokens. `jti` is the session id; everything
/// else is standard JWT bookkeeping.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated session data extracted from the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub username: String,
    /// The token's `jti`; carts are keyed by this value
    pub session_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The session guard stores the SessionUser before handlers run
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub session_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        session_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            session_expiration,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_audience: cfg.auth_audience.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            session_expiration: Duration::from_secs(cfg.jwt_expiration as u64),
        }
    }
}

/// Session token as returned by the login endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Entry in the in-memory revocation list
#[derive(Clone, Debug)]
struct RevokedSession {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Password checks and session token lifecycle.
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
    revoked_sessions: Arc<RwLock<Vec<RevokedSession>>>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            revoked_sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Hash a password into an Argon2id PHC string
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashingError(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC string. A wrong password is
    /// `Ok(false)`; only malformed hashes and backend failures are errors.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|e| AuthError::HashingError(e.to_string()))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::HashingError(e.to_string())),
        }
    }

    /// Look up a user by name and check the password, issuing a session
    /// token on success. Unknown users and bad passwords are
    /// indistinguishable to the caller.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, AuthError> {
        let found = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &found.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.generate_token(&found)
    }

    /// Create the named user if it does not exist yet. Returns the stored
    /// model either way.
    pub async fn ensure_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        if let Some(found) = existing {
            return Ok(found);
        }

        let fresh = user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(self.hash_password(password)?),
            ..Default::default()
        };

        fresh
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }

    /// Issue a session token for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<SessionToken, AuthError> {
        let lifetime = ChronoDuration::from_std(self.config.session_expiration)
            .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let now = Utc::now();

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(SessionToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.session_expiration.as_secs() as i64,
        })
    }

    /// Validate a session token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_session_revoked(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Revoke a session by its `jti`. Revoking an already-revoked session
    /// is a no-op.
    pub async fn revoke_session(&self, jti: &str) {
        let now = Utc::now();
        // Entries only need to outlive the tokens they block
        let keep_until =
            now + ChronoDuration::seconds(self.config.session_expiration.as_secs() as i64);

        let mut revoked = self.revoked_sessions.write().await;
        revoked.retain(|entry| entry.expiry > now);
        if !revoked.iter().any(|entry| entry.jti == jti) {
            revoked.push(RevokedSession {
                jti: jti.to_string(),
                expiry: keep_until,
            });
        }
    }

    async fn is_session_revoked(&self, jti: &str) -> bool {
        let revoked = self.revoked_sessions.read().await;
        revoked.iter().any(|entry| entry.jti == jti)
    }
}

/// Everything that can go wrong between a request and a valid session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Session missing from request")]
    MissingAuth,

    #[error("Credentials rejected")]
    InvalidCredentials,

    #[error("Bearer token missing")]
    MissingToken,

    #[error("Token validation failed")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Session revoked")]
    RevokedToken,

    #[error("Token signing failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    HashingError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Status, stable error code, and client-safe message. Server-side
    /// failures all collapse to a generic 500 message.
    fn wire_parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required",
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials!",
            ),
            Self::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING_TOKEN",
                "No authentication token provided",
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token",
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired",
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked",
            ),
            Self::TokenCreation(_) | Self::HashingError(_) | Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error",
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_DATABASE_ERROR",
                "Internal server error",
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.wire_parts();
        let body = Json(serde_json::json!({
            "error": { "code": code, "message": message }
        }));

        (status, body).into_response()
    }
}

/// Session guard middleware. Validates the bearer token, stores the
/// `SessionUser` in request extensions, and bounces anonymous callers to
/// the login page.
pub async fn session_guard(mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();

    let Some(auth_service) = request.extensions().get::<Arc<AuthService>>().cloned() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication service not available",
        )
            .into_response();
    };

    match extract_auth_from_headers(&headers, &auth_service).await {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => {
            debug!("Redirecting unauthenticated request to login: {}", e);
            Redirect::to("/login").into_response()
        }
    }
}

/// Extract session info from request headers. Used by the guard and by
/// routes that peek at the session without requiring one.
pub async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<SessionUser, AuthError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::MissingToken)?;

    let claims = auth_service.validate_token(bearer).await?;
    Ok(SessionUser {
        user_id: claims.sub,
        username: claims.username,
        session_id: claims.jti,
    })
}

/// Extension methods for Router to add the session guard
pub trait SessionRouterExt {
    fn with_session_guard(self) -> Self;
}

impl<S> SessionRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_session_guard(self) -> Self {
        self.layer(axum::middleware::from_fn(session_guard))
    }
}

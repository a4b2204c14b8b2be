//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use unimate_core::domain::Role;
use unimate_core::ports::PortError;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::decode_token;
use crate::web::state::AppState;

/// Everything that can go wrong while turning a bearer credential into an
/// identity. Expired is kept apart from invalid because the caller's remedy
/// differs (refresh vs. re-authenticate).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No authorization header provided")]
    MissingCredential,
    #[error("No token provided")]
    MalformedCredential,
    #[error("Token expired")]
    ExpiredCredential,
    #[error("Invalid token")]
    InvalidCredential,
    #[error("User not found")]
    UserNotFound,
    #[error("Server configuration error")]
    Configuration,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// The verified identity attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Middleware that validates the bearer token and resolves it to a user.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers
/// (and the chat rate limiter) to use. If invalid or missing, returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredential)?;

    // Accept both "Bearer <token>" and a bare token.
    let token = auth_header.strip_prefix("Bearer ").unwrap_or(auth_header);
    if token.is_empty() {
        return Err(AuthError::MalformedCredential.into());
    }

    if state.config.jwt_secret.is_empty() {
        return Err(AuthError::Configuration.into());
    }

    let claims = decode_token(token, &state.config.jwt_secret).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredCredential,
            _ => AuthError::InvalidCredential,
        }
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidCredential)?;
    let user = state.db.get_user_by_id(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => {
            warn!(%user_id, "token holder no longer exists");
            ApiError::from(AuthError::UserNotFound)
        }
        other => other.into(),
    })?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        role: user.role,
    });
    Ok(next.run(req).await)
}

/// Middleware for the admin routes. Must run behind `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AuthError::MissingCredential)?;

    if user.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Insufficient permissions. Required role: admin".to_string(),
        ));
    }
    Ok(next.run(req).await)
}

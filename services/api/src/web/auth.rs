//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: register, login, token refresh, and profile.
//! Access and refresh tokens are stateless JWTs signed with separate secrets.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use unimate_core::domain::User;
use unimate_core::ports::PortError;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;

const ACCESS_TOKEN_DAYS: i64 = 7;
const REFRESH_TOKEN_DAYS: i64 = 30;

//=========================================================================================
// Tokens
//=========================================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(user_id: Uuid, secret: &str, ttl: Duration) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

//=========================================================================================
// Input Validation
//=========================================================================================

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    // RFC 5322 compliant email regex (simplified)
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

fn valid_email(email: &str) -> bool {
    email.len() <= 254 && !email.contains("..") && EMAIL_RE.is_match(email)
}

/// Min 8 chars, at least one uppercase, one lowercase, and one digit.
fn valid_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct PreferencesDto {
    pub language: String,
    pub university: String,
    pub course: String,
}

/// The outward user. Never carries the password digest.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub preferences: PreferencesDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role.as_str().to_string(),
            preferences: PreferencesDto {
                language: user.preferences.language,
                university: user.preferences.university,
                course: user.preferences.course,
            },
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    pub user: UserDto,
}

#[derive(Serialize, ToSchema)]
pub struct RefreshResponse {
    pub success: bool,
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserDto,
}

fn token_pair(state: &AppState, user_id: Uuid) -> Result<(String, String), ApiError> {
    let token = issue_token(
        user_id,
        &state.config.jwt_secret,
        Duration::days(ACCESS_TOKEN_DAYS),
    )?;
    let refresh_token = issue_token(
        user_id,
        &state.config.jwt_refresh_secret,
        Duration::days(REFRESH_TOKEN_DAYS),
    )?;
    Ok((token, refresh_token))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid email or password shape"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Too many authentication attempts")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    if !valid_password(&req.password) {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters with at least one uppercase letter, \
             one lowercase letter, and one number"
                .to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("failed to hash password".to_string())
        })?
        .to_string();

    let user = state
        .db
        .create_user(&email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                ApiError::Conflict("User with this email already exists".to_string())
            }
            other => other.into(),
        })?;
    info!(email = %user.email, "registered new user");

    let (token, refresh_token) = token_pair(&state, user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User created successfully".to_string(),
            token,
            refresh_token,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many authentication attempts")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    let email = req.email.trim().to_lowercase();

    // Unknown email and wrong password answer identically.
    let creds = state
        .db
        .get_user_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            other => other.into(),
        })?;

    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("stored credentials are unreadable".to_string())
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let user = state.db.get_user_by_id(creds.id).await?;
    let (token, refresh_token) = token_pair(&state, user.id)?;
    info!(email = %user.email, "user logged in");

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
        refresh_token,
        user: user.into(),
    }))
}

/// POST /api/auth/refresh - Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = RefreshResponse),
        (status = 400, description = "Refresh token missing"),
        (status = 401, description = "Refresh token invalid or expired")
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    if req.refresh_token.is_empty() {
        return Err(ApiError::Validation(
            "Refresh token is required".to_string(),
        ));
    }

    let claims = decode_token(&req.refresh_token, &state.config.jwt_refresh_secret).map_err(
        |e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ApiError::Unauthorized("Refresh token expired".to_string())
            }
            _ => ApiError::Unauthorized("Invalid refresh token".to_string()),
        },
    )?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token".to_string()))?;

    let user = state.db.get_user_by_id(user_id).await.map_err(|e| match e {
        PortError::NotFound(_) => ApiError::Unauthorized("User not found".to_string()),
        other => other.into(),
    })?;

    let (token, refresh_token) = token_pair(&state, user.id)?;
    Ok(Json(RefreshResponse {
        success: true,
        token,
        refresh_token,
    }))
}

/// GET /api/auth/me - The authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The current user", body = MeResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MeResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_id(current.id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;

    Ok(Json(MeResponse {
        success: true,
        user: user.into(),
    }))
}

//=========================================================================================
// Tests
//=========================================================================================

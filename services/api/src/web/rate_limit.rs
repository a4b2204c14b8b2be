//! services/api/src/web/rate_limit.rs
//!
//! Fixed-window rate limiting policies, layered as middleware:
//! - global: 100 requests / 15 min per client IP, on every route;
//! - auth class: 5 / 15 min per IP + user-agent hash, on register and login;
//! - chat class: 30 / 60 s per authenticated user, on send; admins exempt.
//!
//! The windows are fixed, not sliding: a counter resets entirely at the window
//! boundary, which admits up to 2x the max across a boundary straddle. That is
//! an accepted approximation of the policy.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::warn;
use unimate_core::domain::Role;

use crate::error::ApiError;
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;

const GLOBAL_MAX: u32 = 100;
const GLOBAL_WINDOW_MINS: i64 = 15;
const GLOBAL_MESSAGE: &str = "Too many requests. Please try again later.";

const AUTH_MAX: u32 = 5;
const AUTH_WINDOW_MINS: i64 = 15;
const AUTH_MESSAGE: &str = "Too many authentication attempts. Please try again later.";

const CHAT_MAX: u32 = 30;
const CHAT_WINDOW_SECS: i64 = 60;
const CHAT_MESSAGE: &str = "Too many chat requests. Please try again later.";

//=========================================================================================
// Key Derivation
//=========================================================================================

/// Best-effort client address: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, else a shared bucket.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Short hash of the user-agent string. A bucketing key to blunt trivial
/// IP rotation, not device fingerprinting and not cryptography.
fn user_agent_hash(headers: &HeaderMap) -> String {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    user_agent.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}

//=========================================================================================
// Policies
//=========================================================================================

async fn gate(
    state: &AppState,
    key: &str,
    window: Duration,
    max: u32,
    message: &str,
) -> Result<(), ApiError> {
    let decision = state.rate_counters.increment(key, window, max).await;
    if decision.allowed {
        return Ok(());
    }
    warn!(key, "rate limit exceeded");
    let retry_after_secs = (decision.reset_at - Utc::now()).num_seconds().max(1) as u64;
    Err(ApiError::RateLimited {
        message: message.to_string(),
        retry_after_secs,
    })
}

/// Catches abuse before it reaches any endpoint.
pub async fn global_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = format!("global:{}", client_ip(req.headers()));
    gate(
        &state,
        &key,
        Duration::minutes(GLOBAL_WINDOW_MINS),
        GLOBAL_MAX,
        GLOBAL_MESSAGE,
    )
    .await?;
    Ok(next.run(req).await)
}

/// Stricter limits for the credential-guessing surface.
pub async fn auth_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = format!(
        "auth:{}:{}",
        client_ip(req.headers()),
        user_agent_hash(req.headers())
    );
    gate(
        &state,
        &key,
        Duration::minutes(AUTH_WINDOW_MINS),
        AUTH_MAX,
        AUTH_MESSAGE,
    )
    .await?;
    Ok(next.run(req).await)
}

/// Per-user limit on chat sends. Runs behind `require_auth`, so the key is the
/// authenticated user id, with an IP + user-agent fallback for edge cases.
/// Admins are exempt from this limiter only, never from the global one.
pub async fn chat_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = req.extensions().get::<CurrentUser>().cloned();
    if let Some(user) = &current {
        if user.role == Role::Admin {
            return Ok(next.run(req).await);
        }
    }
    let key = match &current {
        Some(user) => format!("user:{}", user.id),
        None => format!(
            "ip:{}:{}",
            client_ip(req.headers()),
            user_agent_hash(req.headers())
        ),
    };
    gate(
        &state,
        &key,
        Duration::seconds(CHAT_WINDOW_SECS),
        CHAT_MAX,
        CHAT_MESSAGE,
    )
    .await?;
    Ok(next.run(req).await)
}

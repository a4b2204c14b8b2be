//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses. Every boundary (auth middleware, rate limiter, store
//! adapter, upstream client) converts its own failure into one of these kinds
//! before it reaches a handler; handlers only ever add context, never
//! re-interpret a kind.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use crate::web::middleware::AuthError;
use unimate_core::ports::{AssistantError, PortError};

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller's input is malformed; correcting it makes the request valid.
    #[error("{0}")]
    Validation(String),

    /// Credential verification failed in the auth middleware.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// A 401 with an endpoint-specific message (login, refresh).
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role does not permit the operation.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Duplicate identity (e.g. an already-registered email).
    #[error("{0}")]
    Conflict(String),

    /// A rate limiter rejected the request.
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },

    /// The upstream AI service call failed; classified at the client boundary.
    #[error("AI service error: {0}")]
    Assistant(#[from] AssistantError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ApiError::NotFound(msg),
            PortError::Conflict(msg) => ApiError::Conflict(msg),
            PortError::Unexpected(msg) => ApiError::Internal(msg),
        }
    }
}

impl ApiError {
    /// The HTTP status and caller-facing message for this error.
    ///
    /// Upstream AI failures mirror the upstream status code while normalizing
    /// the message, so an upstream 429 stays distinct from our own limiter's
    /// 429 body. Internal detail never reaches the caller in release builds.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Auth(err) => (err.status(), err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::RateLimited { message, .. } => {
                (StatusCode::TOO_MANY_REQUESTS, message.clone())
            }
            ApiError::Assistant(err) => assistant_status_and_message(err),
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => {
                let message = if cfg!(debug_assertions) {
                    format!("Internal Server Error: {}", self)
                } else {
                    "Internal Server Error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }
}

fn assistant_status_and_message(err: &AssistantError) -> (StatusCode, String) {
    match err {
        AssistantError::ConnectionRefused => (
            StatusCode::SERVICE_UNAVAILABLE,
            "AI service is not available. Please try again later.".to_string(),
        ),
        AssistantError::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            "AI service request timed out. Please try again.".to_string(),
        ),
        AssistantError::UpstreamStatus(code) => {
            let status =
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let message = match *code {
                400 => "Invalid request to AI service. Please check your message.",
                429 => "AI service is rate limited. Please try again in a moment.",
                code if code >= 500 => "AI service is experiencing issues. Please try again later.",
                _ => "AI service is temporarily unavailable. Please try again later.",
            };
            (status, message.to_string())
        }
        AssistantError::Transport(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "AI service is temporarily unavailable. Please try again later.".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("request failed: {:?}", self);
        }
        let body = Json(json!({ "success": false, "message": message }));

        if let ApiError::RateLimited {
            retry_after_secs, ..
        } = &self
        {
            return (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

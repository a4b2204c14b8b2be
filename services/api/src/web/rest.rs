//! services/api/src/web/rest.rs
//!
//! Operational endpoints (banner, health, admin dashboard) and the master
//! definition for the OpenAPI specification.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use utoipa::OpenApi;

use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;
use crate::web::{auth, chat};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::me_handler,
        chat::send_message_handler,
        chat::history_handler,
        chat::delete_conversation_handler,
        root_handler,
        health_handler,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::AuthResponse,
        auth::RefreshResponse,
        auth::MeResponse,
        auth::UserDto,
        auth::PreferencesDto,
        chat::SendMessageRequest,
        chat::RequestContext,
        chat::SendMessageResponse,
        chat::HistoryResponse,
        chat::ConversationDto,
        chat::MessageDto,
        chat::ContextDto,
        chat::PaginationDto,
    )),
    tags(
        (name = "UniMate API", description = "Authentication and AI chat endpoints for university guidance.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Operational Handlers
//=========================================================================================

/// GET / - Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner"))
)]
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "UniMate API Server",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

/// GET /health - Liveness probe including database connectivity
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Health report"))
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match state.db.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!("health probe failed to reach the database: {}", e);
            "disconnected"
        }
    };
    Json(json!({
        "status": if database == "connected" { "healthy" } else { "unhealthy" },
        "database": database,
        "timestamp": Utc::now(),
    }))
}

/// GET /api/admin/dashboard - Admin landing data
pub async fn dashboard_handler(Extension(current): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({
        "message": "Admin dashboard",
        "user": {
            "id": current.id,
            "email": current.email,
            "role": current.role.as_str(),
        },
    }))
}

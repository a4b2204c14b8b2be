pub mod auth;
pub mod chat;
pub mod middleware;
pub mod rate_limit;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use rest::ApiDoc;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use state::AppState;

/// Builds the full application router. The global limiter wraps everything;
/// `require_auth` is layered outside the chat limiter so the limiter can key
/// on the authenticated user.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.frontend_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let auth_router = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit::auth_rate_limit,
        ))
        .route("/refresh", post(auth::refresh_handler))
        .merge(
            Router::new()
                .route("/me", get(auth::me_handler))
                .route_layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::require_auth,
                )),
        );

    let chat_router = Router::new()
        .route("/send", post(chat::send_message_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit::chat_rate_limit,
        ))
        .route("/history", get(chat::history_handler))
        .route("/history/{id}", delete(chat::delete_conversation_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let admin_router = Router::new()
        .route("/dashboard", get(rest::dashboard_handler))
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/", get(rest::root_handler))
        .route("/health", get(rest::health_handler))
        .nest("/api/auth", auth_router)
        .nest("/api/chat", chat_router)
        .nest("/api/admin", admin_router)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit::global_rate_limit,
        ))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

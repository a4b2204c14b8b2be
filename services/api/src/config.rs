//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub ai_service_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub frontend_origin: HeaderValue,
    /// When a send carries no session identifier, fall back to the user's most
    /// recent conversation instead of starting a fresh one. Reproduces the
    /// legacy single-conversation behavior; questionable for multi-tab use,
    /// which is why it sits behind a flag.
    pub legacy_session_fallback: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Collaborator Settings ---
        let ai_service_url = std::env::var("AI_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        let jwt_refresh_secret = std::env::var("JWT_REFRESH_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_REFRESH_SECRET".to_string()))?;

        let frontend_origin_str =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let frontend_origin = frontend_origin_str.parse::<HeaderValue>().map_err(|e| {
            ConfigError::InvalidValue("FRONTEND_URL".to_string(), e.to_string())
        })?;

        let legacy_session_fallback = match std::env::var("CHAT_LEGACY_SESSION_FALLBACK") {
            Ok(raw) => raw.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(
                    "CHAT_LEGACY_SESSION_FALLBACK".to_string(),
                    format!("'{}' is not a boolean", raw),
                )
            })?,
            Err(_) => true,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            ai_service_url,
            jwt_secret,
            jwt_refresh_secret,
            frontend_origin,
            legacy_session_fallback,
        })
    }
}

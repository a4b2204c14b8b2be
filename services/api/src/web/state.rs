//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use unimate_core::ports::{AssistantService, DatabaseService, RateCounterStore};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub assistant: Arc<dyn AssistantService>,
    pub rate_counters: Arc<dyn RateCounterStore>,
    pub config: Arc<Config>,
}

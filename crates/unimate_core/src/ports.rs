//! crates/unimate_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, Conversation, ConversationContext, ConversationPage, MessageRole, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Database Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---

    /// Creates a new user. Fails with `PortError::Conflict` if the email is taken.
    async fn create_user(&self, email: &str, password_hash: &str) -> PortResult<User>;

    /// Looks up login credentials by lowercase email.
    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    // --- Conversation Management ---

    /// Finds the conversation for a (user, session) pair, if one exists.
    async fn find_conversation(
        &self,
        user_id: Uuid,
        session_id: &str,
    ) -> PortResult<Option<Conversation>>;

    /// Finds the user's most recently updated conversation. Only used as the
    /// legacy fallback when a send carries no session identifier.
    async fn find_latest_conversation(&self, user_id: Uuid) -> PortResult<Option<Conversation>>;

    async fn create_conversation(
        &self,
        user_id: Uuid,
        session_id: &str,
        context: &ConversationContext,
    ) -> PortResult<Conversation>;

    /// Appends one message to a conversation and bumps its `updated_at`.
    /// Messages are immutable once appended.
    async fn append_message(&self, conversation_id: Uuid, message: &ChatMessage)
        -> PortResult<()>;

    /// Replaces the stored context with an already-merged one.
    async fn update_context(
        &self,
        conversation_id: Uuid,
        context: &ConversationContext,
    ) -> PortResult<()>;

    /// Returns one page of the user's conversations, most recently updated first.
    async fn list_conversations(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> PortResult<ConversationPage>;

    /// Deletes a conversation the user owns. A missing id and someone else's id
    /// fail identically with `PortError::NotFound`.
    async fn delete_conversation(&self, conversation_id: Uuid, user_id: Uuid) -> PortResult<()>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> PortResult<()>;
}

//=========================================================================================
// Assistant (Upstream AI) Port
//=========================================================================================

/// One prior transcript turn, reduced to the shape the AI service consumes.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

/// The outbound payload for a single chat turn.
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub message: String,
    pub context: ConversationContext,
    pub history: Vec<HistoryEntry>,
    pub user_id: Uuid,
    pub session_id: String,
}

/// The upstream reply, with the reply text already resolved to a single field.
#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub message: String,
    pub sources: Vec<String>,
    /// Context echoed back by the AI service, passed through verbatim when present.
    pub context: Option<serde_json::Value>,
}

/// Classified failures of the upstream call. Raw upstream error text never
/// crosses this boundary except inside `Transport`, which is logged, not shown.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("connection to the AI service was refused")]
    ConnectionRefused,
    #[error("the AI service did not respond in time")]
    Timeout,
    #[error("the AI service answered with status {0}")]
    UpstreamStatus(u16),
    #[error("transport failure talking to the AI service: {0}")]
    Transport(String),
}

#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Performs a single chat call. One attempt per user-initiated send; the
    /// caller owns retry-by-resubmission.
    async fn chat(&self, request: AssistantRequest) -> Result<AssistantReply, AssistantError>;
}

//=========================================================================================
// Rate Counter Port
//=========================================================================================

/// The outcome of counting one request against a fixed window.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// An injectable per-key counter store. The in-process implementation keeps
/// counters in memory; a multi-process deployment swaps in a shared store
/// without touching the policies built on top.
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    /// Counts one request against `key`'s current fixed window. The counter
    /// resets entirely at the window boundary.
    async fn increment(&self, key: &str, window: Duration, max: u32) -> RateDecision;
}

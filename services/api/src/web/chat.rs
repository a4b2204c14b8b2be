//! services/api/src/web/chat.rs
//!
//! The chat pipeline and the history endpoints. `send_message_handler` is the
//! orchestration core: conversation resolution, context merge, bounded history,
//! the single upstream call, then the two-phase persistence of the turn.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;
use unimate_core::domain::{ChatMessage, Conversation, ConversationContext, MessageRole};
use unimate_core::ports::{AssistantRequest, HistoryEntry, PortError};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentUser;
use crate::web::state::AppState;

/// How many transcript turns travel upstream with each send. Bounds payload
/// size and cost; fixed, not configuration.
const HISTORY_WINDOW: usize = 10;

const DEFAULT_PAGE_LIMIT: u32 = 20;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<RequestContext>,
}

/// Context fields a client may attach to a send. Empty or absent fields never
/// overwrite stored ones.
#[derive(Deserialize, Default, Clone, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    pub session_id: Option<String>,
    pub university: Option<String>,
    pub stage: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<Map<String, Value>>,
}

#[derive(Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: String,
    pub sources: Vec<String>,
    #[schema(value_type = Object)]
    pub context: Value,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageDto {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ContextDto {
    pub university: String,
    pub stage: String,
    #[schema(value_type = Object)]
    pub preferences: Map<String, Value>,
}

impl From<&ConversationContext> for ContextDto {
    fn from(context: &ConversationContext) -> Self {
        Self {
            university: context.university.clone(),
            stage: context.stage.clone(),
            preferences: context.preferences.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: Uuid,
    pub session_id: String,
    pub messages: Vec<MessageDto>,
    pub context: ContextDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationDto {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id,
            session_id: conversation.session_id.clone(),
            messages: conversation
                .messages
                .iter()
                .map(|m| MessageDto {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                    timestamp: m.timestamp,
                    sources: m.sources.clone(),
                })
                .collect(),
            context: (&conversation.context).into(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
    pub has_more: bool,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub conversations: Vec<ConversationDto>,
    pub pagination: PaginationDto,
}

//=========================================================================================
// Pipeline Helpers
//=========================================================================================

fn incoming_context(request: &RequestContext) -> ConversationContext {
    ConversationContext {
        university: request.university.clone().unwrap_or_default(),
        stage: request.stage.clone().unwrap_or_default(),
        preferences: request.preferences.clone().unwrap_or_default(),
    }
}

/// The last `HISTORY_WINDOW` messages, oldest to newest, reduced to the shape
/// the AI service consumes.
fn history_window(messages: &[ChatMessage]) -> Vec<HistoryEntry> {
    let start = messages.len().saturating_sub(HISTORY_WINDOW);
    messages[start..]
        .iter()
        .map(|m| HistoryEntry {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

fn context_to_json(context: &ConversationContext) -> Value {
    json!({
        "university": context.university,
        "stage": context.stage,
        "preferences": context.preferences,
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/chat/send - Send a message through the AI pipeline
#[utoipa::path(
    post,
    path = "/api/chat/send",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Assistant reply", body = SendMessageResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Not authenticated"),
        (status = 429, description = "Chat rate limit exceeded"),
        (status = 503, description = "AI service unavailable"),
        (status = 504, description = "AI service timed out")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation(
            "Message is required and must be a non-empty string".to_string(),
        ));
    }
    let request_context = req.context.unwrap_or_default();
    info!(
        user = %current.email,
        preview = %message.chars().take(50).collect::<String>(),
        "chat send"
    );

    // Resolve the conversation for this (user, session) pair. With no session
    // identifier the legacy fallback picks up the user's latest conversation;
    // with the flag off, a bare send always starts fresh.
    let existing = match request_context.session_id.as_deref() {
        Some(session_id) => state.db.find_conversation(current.id, session_id).await?,
        None if state.config.legacy_session_fallback => {
            state.db.find_latest_conversation(current.id).await?
        }
        None => None,
    };

    let incoming = incoming_context(&request_context);
    let (session_id, context, history) = match &existing {
        Some(conversation) => {
            let mut merged = conversation.context.clone();
            merged.merge(&incoming);
            (
                conversation.session_id.clone(),
                merged,
                history_window(&conversation.messages),
            )
        }
        None => {
            let session_id = request_context.session_id.clone().unwrap_or_else(|| {
                format!("session_{}_{}", current.id, Utc::now().timestamp_millis())
            });
            (session_id, incoming, Vec::new())
        }
    };

    // Single attempt, 30-second bound inside the adapter. Nothing is written
    // before this call resolves, so a failure leaves the transcript untouched.
    let reply = state
        .assistant
        .chat(AssistantRequest {
            message: message.to_string(),
            context: context.clone(),
            history,
            user_id: current.id,
            session_id: session_id.clone(),
        })
        .await?;

    // Persist the user turn first so it survives a crash before the assistant
    // turn lands; then persist the assistant turn with its sources.
    let conversation_id = match &existing {
        Some(conversation) => {
            state.db.update_context(conversation.id, &context).await?;
            conversation.id
        }
        None => {
            state
                .db
                .create_conversation(current.id, &session_id, &context)
                .await?
                .id
        }
    };
    state
        .db
        .append_message(
            conversation_id,
            &ChatMessage {
                role: MessageRole::User,
                content: message.to_string(),
                timestamp: Utc::now(),
                sources: Vec::new(),
            },
        )
        .await?;
    state
        .db
        .append_message(
            conversation_id,
            &ChatMessage {
                role: MessageRole::Assistant,
                content: reply.message.clone(),
                timestamp: Utc::now(),
                sources: reply.sources.clone(),
            },
        )
        .await?;
    info!(user = %current.email, session = %session_id, "conversation saved");

    let context_json = reply
        .context
        .unwrap_or_else(|| context_to_json(&context));
    Ok(Json(SendMessageResponse {
        success: true,
        message: reply.message,
        sources: reply.sources,
        context: context_json,
    }))
}

/// GET /api/chat/history - Paginated conversation history
#[utoipa::path(
    get,
    path = "/api/chat/history",
    params(
        ("page" = Option<u32>, Query, description = "1-based page, clamped to >= 1"),
        ("limit" = Option<u32>, Query, description = "Page size, clamped to 1..=50")
    ),
    responses(
        (status = 200, description = "One page of conversations", body = HistoryResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // Unparseable values fall back to the defaults rather than erroring.
    let page = query
        .page
        .as_deref()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1);
    let limit = query
        .limit
        .as_deref()
        .and_then(|l| l.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PAGE_LIMIT);

    let history = state.db.list_conversations(current.id, page, limit).await?;
    info!(
        user = %current.email,
        count = history.conversations.len(),
        page = history.page,
        "retrieved conversation history"
    );

    Ok(Json(HistoryResponse {
        success: true,
        conversations: history.conversations.iter().map(Into::into).collect(),
        pagination: PaginationDto {
            page: history.page,
            limit: history.limit,
            total: history.total,
            pages: history.pages(),
            has_more: history.has_more(),
        },
    }))
}

/// DELETE /api/chat/history/{id} - Delete an owned conversation
#[utoipa::path(
    delete,
    path = "/api/chat/history/{id}",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation deleted"),
        (status = 400, description = "Malformed conversation id"),
        (status = 404, description = "Conversation missing or not owned")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let conversation_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::Validation("Invalid conversation ID".to_string()))?;

    // Missing and not-owned answer identically so conversation ids of other
    // users cannot be probed.
    state
        .db
        .delete_conversation(conversation_id, current.id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::NotFound(
                "Conversation not found or you do not have permission to delete it".to_string(),
            ),
            other => other.into(),
        })?;
    info!(user = %current.email, conversation = %conversation_id, "conversation deleted");

    Ok(Json(json!({
        "success": true,
        "message": "Conversation deleted successfully",
    })))
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: usize) -> ChatMessage {
        ChatMessage {
            role: if n % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            },
            content: format!("turn {}", n),
            timestamp: Utc::now(),
            sources: Vec::new(),
        }
    }

    #[test]
    fn history_window_keeps_the_last_ten_in_order() {
        let messages: Vec<ChatMessage> = (0..13).map(message).collect();
        let window = history_window(&messages);

        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window.first().unwrap().content, "turn 3");
        assert_eq!(window.last().unwrap().content, "turn 12");
    }

    #[test]
    fn history_window_passes_short_transcripts_whole() {
        let messages: Vec<ChatMessage> = (0..4).map(message).collect();
        let window = history_window(&messages);

        assert_eq!(window.len(), 4);
        assert_eq!(window.first().unwrap().content, "turn 0");
    }

    #[test]
    fn incoming_context_defaults_absent_fields_to_empty() {
        let context = incoming_context(&RequestContext::default());
        assert!(context.university.is_empty());
        assert!(context.stage.is_empty());
        assert!(context.preferences.is_empty());
    }
}

//! services/api/src/adapters/assistant.rs
//!
//! This module contains the HTTP adapter for the external AI service. It
//! implements the `AssistantService` port from the `core` crate and owns the
//! classification of every way the upstream call can fail.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};
use unimate_core::ports::{AssistantError, AssistantReply, AssistantRequest, AssistantService};

/// Bound on the single upstream call. Fixed by contract with the AI service,
/// not configuration.
const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Used when the upstream payload carries no usable reply text at all.
const EMPTY_REPLY_PLACEHOLDER: &str = "No response received";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AssistantService` over the AI service's
/// `POST /ai/chat` JSON endpoint.
#[derive(Clone)]
pub struct HttpAssistantAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAssistantAdapter {
    /// Creates a new `HttpAssistantAdapter` with the standard 30-second bound.
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, CHAT_TIMEOUT)
    }

    /// Internal constructor with an explicit bound (for testing).
    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }
}

//=========================================================================================
// `AssistantService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssistantService for HttpAssistantAdapter {
    async fn chat(&self, request: AssistantRequest) -> Result<AssistantReply, AssistantError> {
        let history: Vec<Value> = request
            .history
            .iter()
            .map(|h| json!({ "role": h.role.as_str(), "content": h.content }))
            .collect();
        let body = json!({
            "message": request.message,
            "context": {
                "university": request.context.university,
                "stage": request.context.stage,
                "preferences": request.context.preferences,
                "conversation_history": history,
            },
            "userId": request.user_id.to_string(),
            "sessionId": request.session_id,
        });

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/ai/chat", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!(
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "AI service returned an error"
            );
            return Err(AssistantError::UpstreamStatus(status.as_u16()));
        }

        let payload: Value = response.json().await.map_err(classify_transport)?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "AI service responded"
        );
        Ok(parse_reply(payload))
    }
}

fn classify_transport(err: reqwest::Error) -> AssistantError {
    if err.is_timeout() {
        AssistantError::Timeout
    } else if err.is_connect() {
        AssistantError::ConnectionRefused
    } else {
        AssistantError::Transport(err.to_string())
    }
}

/// Resolves the reply text from the first non-empty of the `message`,
/// `response`, and `content` fields, falling back to a fixed placeholder.
fn parse_reply(payload: Value) -> AssistantReply {
    let message = ["message", "response", "content"]
        .iter()
        .find_map(|key| {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(EMPTY_REPLY_PLACEHOLDER)
        .to_string();

    let sources = payload
        .get("sources")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let context = payload.get("context").cloned();

    AssistantReply {
        message,
        sources,
        context,
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use unimate_core::domain::ConversationContext;
    use uuid::Uuid;

    fn request() -> AssistantRequest {
        AssistantRequest {
            message: "hello".to_string(),
            context: ConversationContext::default(),
            history: Vec::new(),
            user_id: Uuid::new_v4(),
            session_id: "session_test".to_string(),
        }
    }

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn reply_text_falls_back_through_the_field_chain() {
        let reply = parse_reply(json!({ "response": "from response", "content": "ignored" }));
        assert_eq!(reply.message, "from response");

        let reply = parse_reply(json!({ "message": "", "content": "from content" }));
        assert_eq!(reply.message, "from content");

        let reply = parse_reply(json!({}));
        assert_eq!(reply.message, "No response received");
    }

    #[test]
    fn sources_and_context_are_carried_through() {
        let reply = parse_reply(json!({
            "message": "hi",
            "sources": ["a", "b"],
            "context": { "university": "Moratuwa" },
        }));
        assert_eq!(reply.sources, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            reply.context,
            Some(json!({ "university": "Moratuwa" }))
        );
    }

    #[tokio::test]
    async fn upstream_error_statuses_are_classified() {
        let router = Router::new().route(
            "/ai/chat",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = spawn_upstream(router).await;
        let adapter = HttpAssistantAdapter::new(base);

        let err = adapter.chat(request()).await.unwrap_err();
        assert!(matches!(err, AssistantError::UpstreamStatus(429)));
    }

    #[tokio::test]
    async fn slow_upstream_is_classified_as_timeout() {
        let router = Router::new().route(
            "/ai/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({ "message": "too late" }))
            }),
        );
        let base = spawn_upstream(router).await;
        let adapter = HttpAssistantAdapter::with_timeout(base, Duration::from_millis(50));

        let err = adapter.chat(request()).await.unwrap_err();
        assert!(matches!(err, AssistantError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_classified_as_connection_refused() {
        // Bind to grab a free port, then drop the listener before calling.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let adapter = HttpAssistantAdapter::new(format!("http://{}", addr));
        let err = adapter.chat(request()).await.unwrap_err();
        assert!(matches!(err, AssistantError::ConnectionRefused));
    }

    #[tokio::test]
    async fn successful_reply_round_trips() {
        let router = Router::new().route(
            "/ai/chat",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["message"], "hello");
                assert!(body["context"]["conversation_history"].is_array());
                Json(json!({ "message": "hi there", "sources": ["doc"] }))
            }),
        );
        let base = spawn_upstream(router).await;
        let adapter = HttpAssistantAdapter::new(base);

        let reply = adapter.chat(request()).await.unwrap();
        assert_eq!(reply.message, "hi there");
        assert_eq!(reply.sources, vec!["doc".to_string()]);
    }
}
